//! Consolidation of duplicate company folders on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::canonical::normalize_for_comparison;
use super::registry::{CompanyMapping, CompanyRegistry};
use crate::error::MergeError;

/// Score two folders' canonical names must exceed before they are merged.
///
/// Stricter than interactive matching because merging moves files.
pub const MERGE_SIMILARITY_THRESHOLD: f64 = 0.85;

/// A pair of registered companies that look like the same organization.
#[derive(Debug, Clone)]
pub struct MergeCandidate {
    pub first: CompanyMapping,
    pub second: CompanyMapping,
    pub similarity: f64,
}

/// One file relocated by a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMove {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Result of merging one candidate pair.
#[derive(Debug)]
pub enum MergeOutcome {
    /// Every file moved and the merged folder was removed.
    Success {
        kept: String,
        removed: String,
        moved: Vec<FileMove>,
    },
    /// The merge stopped part way; both folders still exist.
    PartialFailure {
        kept: String,
        removed: String,
        moved: Vec<FileMove>,
        files_remaining: usize,
        cause: MergeError,
    },
    /// One of the folders no longer exists, usually because an earlier pair
    /// already merged it away.
    NotFound { missing: PathBuf },
}

impl MergeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, MergeOutcome::Success { .. })
    }

    /// Files that changed location, including those moved before a failure.
    pub fn moved(&self) -> &[FileMove] {
        match self {
            MergeOutcome::Success { moved, .. } | MergeOutcome::PartialFailure { moved, .. } => {
                moved
            }
            MergeOutcome::NotFound { .. } => &[],
        }
    }
}

#[derive(Debug)]
pub struct MergeAttempt {
    pub candidate: MergeCandidate,
    pub outcome: MergeOutcome,
}

#[derive(Debug, Default)]
pub struct MergeReport {
    pub attempts: Vec<MergeAttempt>,
    /// Whether the registry was rebuilt from disk afterwards
    pub rescanned: bool,
}

impl MergeReport {
    pub fn merged_count(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.outcome.is_success())
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| matches!(a.outcome, MergeOutcome::PartialFailure { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| matches!(a.outcome, MergeOutcome::NotFound { .. }))
            .count()
    }

    pub fn moved_files(&self) -> impl Iterator<Item = &FileMove> {
        self.attempts.iter().flat_map(|a| a.outcome.moved())
    }
}

/// Finds and merges company folders whose names are near-duplicates.
pub struct DuplicateMerger {
    output_dir: PathBuf,
    threshold: f64,
}

impl DuplicateMerger {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            threshold: MERGE_SIMILARITY_THRESHOLD,
        }
    }

    /// Every pair of mappings, in registration order, scoring above the
    /// merge threshold.
    pub fn find_candidates(&self, registry: &CompanyRegistry) -> Vec<MergeCandidate> {
        let mappings = registry.mappings();
        let scorer = registry.scorer();
        let normalized: Vec<String> = mappings
            .iter()
            .map(|m| normalize_for_comparison(m.canonical_name()))
            .collect();

        let mut candidates = Vec::new();
        for i in 0..mappings.len() {
            for j in (i + 1)..mappings.len() {
                if mappings[i].folder_name() == mappings[j].folder_name() {
                    continue;
                }

                let similarity = scorer.score(&normalized[i], &normalized[j]);
                if similarity > self.threshold {
                    debug!(
                        "Duplicate candidate: {} <-> {} ({:.3})",
                        mappings[i].canonical_name(),
                        mappings[j].canonical_name(),
                        similarity
                    );
                    candidates.push(MergeCandidate {
                        first: mappings[i].clone(),
                        second: mappings[j].clone(),
                        similarity,
                    });
                }
            }
        }

        candidates
    }

    /// Merge the folders of all candidates, then rebuild the registry from
    /// disk if anything was merged.
    pub fn run(&self, registry: &mut CompanyRegistry) -> io::Result<MergeReport> {
        if !self.output_dir.is_dir() {
            return Ok(MergeReport::default());
        }

        info!("Scanning for duplicate company folders to merge...");
        let candidates = self.find_candidates(registry);
        if candidates.is_empty() {
            debug!("No duplicate company folders found");
            return Ok(MergeReport::default());
        }

        info!("Found {} duplicate pairs to merge", candidates.len());

        let mut report = MergeReport::default();
        for candidate in candidates {
            let outcome = self.merge_folders(&candidate.first, &candidate.second);
            report.attempts.push(MergeAttempt { candidate, outcome });
        }

        let merged = report.merged_count();
        if merged > 0 {
            info!("Successfully merged {} duplicate company folders", merged);
            registry.rescan(&self.output_dir)?;
            report.rescanned = true;
        }

        Ok(report)
    }

    /// Move everything from one company's folder into the other's.
    ///
    /// The folder holding more PDFs is kept; on a tie the company with the
    /// shorter canonical name is kept. Colliding file names get `_1`, `_2`, …
    /// before the extension.
    pub fn merge_folders(&self, first: &CompanyMapping, second: &CompanyMapping) -> MergeOutcome {
        let first_dir = self.output_dir.join(first.folder_name());
        let second_dir = self.output_dir.join(second.folder_name());

        for dir in [&first_dir, &second_dir] {
            if !dir.is_dir() {
                warn!(
                    "Cannot merge {} <-> {}: folder {} missing",
                    first.canonical_name(),
                    second.canonical_name(),
                    dir.display()
                );
                return MergeOutcome::NotFound {
                    missing: dir.clone(),
                };
            }
        }

        let first_count = count_pdfs(&first_dir);
        let second_count = count_pdfs(&second_dir);

        let keep_first = first_count > second_count
            || (first_count == second_count
                && first.canonical_name().chars().count()
                    <= second.canonical_name().chars().count());

        let (keep, merge) = if keep_first {
            (first, second)
        } else {
            (second, first)
        };
        let (keep_dir, merge_dir) = if keep_first {
            (first_dir, second_dir)
        } else {
            (second_dir, first_dir)
        };

        info!(
            "Merging '{}' into '{}' ({} files total)",
            merge.canonical_name(),
            keep.canonical_name(),
            first_count + second_count
        );

        let kept = keep.folder_name().to_string();
        let removed = merge.folder_name().to_string();

        let moved = match move_contents(&merge_dir, &keep_dir) {
            Ok(moved) => moved,
            Err((moved, cause)) => {
                error!(
                    "Error merging {} into {}: {}",
                    merge.canonical_name(),
                    keep.canonical_name(),
                    cause
                );
                return MergeOutcome::PartialFailure {
                    kept,
                    removed,
                    moved,
                    files_remaining: count_files(&merge_dir),
                    cause,
                };
            }
        };

        if let Err(source) = fs::remove_dir_all(&merge_dir) {
            error!("Could not remove {}: {}", merge_dir.display(), source);
            return MergeOutcome::PartialFailure {
                kept,
                removed,
                moved,
                files_remaining: count_files(&merge_dir),
                cause: MergeError::RemoveFolder {
                    path: merge_dir,
                    source,
                },
            };
        }

        info!(
            "Successfully merged {} files and removed {}",
            moved.len(),
            removed
        );
        MergeOutcome::Success {
            kept,
            removed,
            moved,
        }
    }
}

/// First free variant of `path`: the path itself, then `stem_1.ext`, `stem_2.ext`, …
pub fn unique_path(path: &Path) -> PathBuf {
    if !is_occupied(path) {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let mut counter = 1;
    loop {
        let file_name = match &extension {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        let candidate = parent.join(file_name);
        if !is_occupied(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Rename, falling back to copy + delete when a rename is not possible
/// (for example across filesystems).
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

fn is_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Move every non-directory entry under `from_root` to the same relative
/// path under `to_root`. On error also returns the moves made before it.
fn move_contents(
    from_root: &Path,
    to_root: &Path,
) -> Result<Vec<FileMove>, (Vec<FileMove>, MergeError)> {
    let mut files = Vec::new();
    for entry in WalkDir::new(from_root).sort_by_file_name() {
        let entry = entry.map_err(|source| {
            (
                Vec::new(),
                MergeError::Walk {
                    path: from_root.to_path_buf(),
                    source,
                },
            )
        })?;
        if !entry.file_type().is_dir() {
            files.push(entry.into_path());
        }
    }

    let mut moved = Vec::with_capacity(files.len());
    for file in files {
        let Ok(relative) = file.strip_prefix(from_root) else {
            continue;
        };
        let target = unique_path(&to_root.join(relative));

        if let Some(parent) = target.parent()
            && let Err(source) = fs::create_dir_all(parent)
        {
            let cause = MergeError::CreateDir {
                path: parent.to_path_buf(),
                source,
            };
            return Err((moved, cause));
        }

        if let Err(source) = move_file(&file, &target) {
            let cause = MergeError::Move {
                from: file,
                to: target,
                source,
            };
            return Err((moved, cause));
        }
        debug!("Moved {} -> {}", file.display(), target.display());
        moved.push(FileMove {
            from: file,
            to: target,
        });
    }

    Ok(moved)
}

fn count_pdfs(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .count()
}

fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| !e.file_type().is_dir())
        .count()
}
