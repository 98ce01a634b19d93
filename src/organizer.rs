//! Placement of analyzed documents into the output tree, with a persisted
//! history so a run can be undone.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Month, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::company::merger::{move_file, unique_path};
use crate::company::registry::RegistryStatistics;
use crate::company::{
    CompanyRegistry, MergeReport, NormalizationSettings, UNKNOWN_COMPANY, load_registry,
    sanitize_for_filesystem,
};
use crate::config::OrganizationConfig;
use crate::llm::DocumentInfo;
use crate::parser::PdfDocument;

pub const HISTORY_FILE: &str = ".ocrganizer_history.json";

const MAX_FILENAME_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct OrganizationStrategy {
    pub structure_pattern: String,
    pub filename_pattern: String,
    pub date_format: String,
}

impl Default for OrganizationStrategy {
    fn default() -> Self {
        Self::from(&OrganizationConfig::default())
    }
}

impl From<&OrganizationConfig> for OrganizationStrategy {
    fn from(config: &OrganizationConfig) -> Self {
        Self {
            structure_pattern: config.structure_pattern.clone(),
            filename_pattern: config.filename_pattern.clone(),
            date_format: config.date_format.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Move,
    Copy,
}

/// One placed file, as recorded in the history file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizedFile {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub company: String,
    pub document_type: String,
    pub date: Option<NaiveDate>,
    pub copied: bool,
    pub organized_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrganizationSummary {
    pub total_organized: usize,
    pub unique_companies: usize,
    pub unique_document_types: usize,
    pub companies: Vec<String>,
    pub document_types: Vec<String>,
    pub normalization: Option<RegistryStatistics>,
}

#[derive(Debug, Default)]
pub struct UndoReport {
    pub restored: usize,
    pub copies_removed: usize,
    pub missing: usize,
    pub failed: Vec<(PathBuf, String)>,
}

/// Destination for one document: the company folder it resolved to and the
/// full target path.
#[derive(Debug, Clone)]
pub struct PlannedDestination {
    pub company: String,
    pub path: PathBuf,
}

/// Single owner of the company registry for a run. All placements go
/// through `&mut self`, so registry updates are serialized.
pub struct FileOrganizer {
    output_dir: PathBuf,
    strategy: OrganizationStrategy,
    registry: Option<CompanyRegistry>,
    merge_report: Option<MergeReport>,
    history: Vec<OrganizedFile>,
}

impl FileOrganizer {
    /// Creates the output directory and, when normalization is enabled,
    /// bootstraps the registry from it (scan, then optional duplicate merge).
    pub fn new(
        output_dir: impl Into<PathBuf>,
        strategy: OrganizationStrategy,
        normalization: Option<NormalizationSettings>,
    ) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).with_context(|| {
            format!("Failed to create output directory {}", output_dir.display())
        })?;

        let (registry, merge_report) = match normalization {
            Some(settings) => {
                info!(
                    "Company normalization enabled with threshold {}",
                    settings.similarity_threshold
                );
                let (registry, report) = load_registry(&output_dir, settings);
                if let Some(report) = &report
                    && let Err(e) = relocate_history(&output_dir, report)
                {
                    warn!("Could not update history after merging folders: {:#}", e);
                }
                (Some(registry), report)
            }
            None => {
                info!("Company normalization disabled");
                (None, None)
            }
        };

        Ok(Self {
            output_dir,
            strategy,
            registry,
            merge_report,
            history: Vec::new(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn registry(&self) -> Option<&CompanyRegistry> {
        self.registry.as_ref()
    }

    /// The startup merge report, if a merge pass ran.
    pub fn take_merge_report(&mut self) -> Option<MergeReport> {
        self.merge_report.take()
    }

    #[cfg(test)]
    pub fn history(&self) -> &[OrganizedFile] {
        &self.history
    }

    /// Resolve the raw company to `(display name, folder name)`.
    fn resolve_company(&mut self, raw_name: &str) -> (String, String) {
        match self.registry.as_mut() {
            Some(registry) => {
                let canonical = registry.normalize(raw_name);
                let folder = registry.folder_name(&canonical);
                debug!(
                    "Normalized '{}' -> '{}' -> folder '{}'",
                    raw_name, canonical, folder
                );
                (canonical, folder)
            }
            None => {
                let name = if raw_name.trim().is_empty() {
                    UNKNOWN_COMPANY.to_string()
                } else {
                    raw_name.trim().to_string()
                };
                let folder = sanitize_for_filesystem(&name);
                (name, folder)
            }
        }
    }

    /// Work out where a document goes. Registers new companies with the
    /// registry but touches nothing on disk.
    pub fn plan_destination(&mut self, info: &DocumentInfo) -> PlannedDestination {
        let (company, company_folder) = self.resolve_company(&info.company_name);

        let mut target_dir = self.output_dir.clone();
        for segment in self.strategy.structure_pattern.split('/') {
            let part = match segment.trim() {
                "" => None,
                "{company}" => Some(company_folder.clone()),
                "{year}" => info.date.map(|d| d.year().to_string()),
                "{month}" => info.date.map(|d| format_month_folder(d.month())),
                "{day}" => info.date.map(|d| format!("{:02}", d.day())),
                "{type}" => Some(sanitize_for_filesystem(&info.document_type)),
                other if other.contains('{') => {
                    debug!("Skipping unknown structure placeholder {}", other);
                    None
                }
                literal => Some(sanitize_for_filesystem(literal)),
            };
            if let Some(part) = part {
                target_dir.push(part);
            }
        }

        let filename = self.generate_filename(info, &company);
        PlannedDestination {
            company,
            path: unique_path(&target_dir.join(filename)),
        }
    }

    /// Move or copy a document to its planned destination and record it.
    pub fn organize_file(
        &mut self,
        document: &PdfDocument,
        info: &DocumentInfo,
        mode: TransferMode,
    ) -> Result<PathBuf> {
        info!("Organizing file: {}", document.path.display());

        let destination = self.plan_destination(info);
        let target = destination.path;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        match mode {
            TransferMode::Copy => {
                fs::copy(&document.path, &target).with_context(|| {
                    format!(
                        "Failed to copy {} to {}",
                        document.path.display(),
                        target.display()
                    )
                })?;
                info!("Copied file to: {}", target.display());
            }
            TransferMode::Move => {
                move_file(&document.path, &target).with_context(|| {
                    format!(
                        "Failed to move {} to {}",
                        document.path.display(),
                        target.display()
                    )
                })?;
                info!("Moved file to: {}", target.display());
            }
        }

        self.history.push(OrganizedFile {
            original_path: document.path.clone(),
            new_path: target.clone(),
            company: destination.company,
            document_type: info.document_type.clone(),
            date: info.date,
            copied: mode == TransferMode::Copy,
            organized_at: Utc::now(),
        });

        Ok(target)
    }

    /// File name from the filename pattern, always ending in `.pdf`.
    pub fn generate_filename(&self, info: &DocumentInfo, company: &str) -> String {
        let date = match info.date {
            Some(date) => format_date(date, &self.strategy.date_format),
            None => "Unknown_Date".to_string(),
        };

        let filename = self
            .strategy
            .filename_pattern
            .replace("{company}", &sanitize_filename(company))
            .replace("{type}", &sanitize_filename(&info.document_type))
            .replace("{date}", &date);

        format!("{}.pdf", sanitize_filename(&filename))
    }

    /// Append this run's entries to the history file in the output directory.
    pub fn save_history(&self) -> Result<()> {
        if self.history.is_empty() {
            return Ok(());
        }

        let mut entries = load_history(&self.output_dir)?;
        entries.extend(self.history.iter().cloned());
        write_history(&self.output_dir, &entries)
    }

    pub fn summary(&self) -> OrganizationSummary {
        let companies: BTreeSet<&str> = self.history.iter().map(|e| e.company.as_str()).collect();
        let document_types: BTreeSet<&str> = self
            .history
            .iter()
            .map(|e| e.document_type.as_str())
            .collect();

        OrganizationSummary {
            total_organized: self.history.len(),
            unique_companies: companies.len(),
            unique_document_types: document_types.len(),
            companies: companies.into_iter().map(String::from).collect(),
            document_types: document_types.into_iter().map(String::from).collect(),
            normalization: self.registry.as_ref().map(CompanyRegistry::statistics),
        }
    }
}

/// Entries recorded in `<output_dir>/.ocrganizer_history.json`, oldest first.
pub fn load_history(output_dir: &Path) -> Result<Vec<OrganizedFile>> {
    let path = output_dir.join(HISTORY_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read history file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse history file {}", path.display()))
}

fn write_history(output_dir: &Path, entries: &[OrganizedFile]) -> Result<()> {
    let path = output_dir.join(HISTORY_FILE);
    let content = serde_json::to_string_pretty(entries)?;
    fs::write(&path, content)
        .with_context(|| format!("Failed to write history file {}", path.display()))
}

/// Point history entries at the new locations of files a folder merge moved.
/// Returns how many entries changed.
pub fn relocate_history(output_dir: &Path, report: &MergeReport) -> Result<usize> {
    let moves: Vec<_> = report.moved_files().collect();
    if moves.is_empty() {
        return Ok(0);
    }

    let mut entries = load_history(output_dir)?;
    let mut updated = BTreeSet::new();
    // In merge order, so a file moved twice ends at its last location.
    for file_move in moves {
        for (index, entry) in entries.iter_mut().enumerate() {
            if entry.new_path == file_move.from {
                debug!(
                    "History entry {} -> {}",
                    entry.new_path.display(),
                    file_move.to.display()
                );
                entry.new_path = file_move.to.clone();
                updated.insert(index);
            }
        }
    }

    if !updated.is_empty() {
        write_history(output_dir, &entries)?;
        info!("Updated {} history entries after merge", updated.len());
    }
    Ok(updated.len())
}

/// Put every recorded file back where it came from, newest first.
///
/// Moved files are moved back; copies are deleted. Directories emptied by
/// the undo are removed up to, but not including, the output directory.
/// Entries that fail or whose file is gone stay in the history file.
pub fn undo_all(output_dir: &Path) -> Result<UndoReport> {
    let entries = load_history(output_dir)?;
    let mut report = UndoReport::default();
    let mut remaining = Vec::new();

    for entry in entries.into_iter().rev() {
        if !entry.new_path.exists() {
            warn!("Organized file not found: {}", entry.new_path.display());
            report.missing += 1;
            remaining.push(entry);
            continue;
        }

        let result = if entry.copied {
            fs::remove_file(&entry.new_path).map(|_| {
                report.copies_removed += 1;
            })
        } else {
            restore(&entry).map(|restored_to| {
                info!(
                    "Restored file from {} to {}",
                    entry.new_path.display(),
                    restored_to.display()
                );
                report.restored += 1;
            })
        };

        match result {
            Ok(()) => {
                if let Some(parent) = entry.new_path.parent() {
                    cleanup_empty_dirs(parent, output_dir);
                }
            }
            Err(e) => {
                warn!("Could not undo {}: {}", entry.new_path.display(), e);
                report.failed.push((entry.new_path.clone(), e.to_string()));
                remaining.push(entry);
            }
        }
    }

    if remaining.is_empty() {
        let path = output_dir.join(HISTORY_FILE);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove history file {}", path.display()))?;
        }
    } else {
        remaining.reverse();
        write_history(output_dir, &remaining)?;
    }

    Ok(report)
}

fn restore(entry: &OrganizedFile) -> std::io::Result<PathBuf> {
    if let Some(parent) = entry.original_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let target = unique_path(&entry.original_path);
    move_file(&entry.new_path, &target)?;
    Ok(target)
}

fn cleanup_empty_dirs(start: &Path, root: &Path) {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }

        let is_empty = fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty {
            break;
        }

        if let Err(e) = fs::remove_dir(dir) {
            warn!("Could not remove directory {}: {}", dir.display(), e);
            break;
        }
        debug!("Removed empty directory: {}", dir.display());
        current = dir.parent();
    }
}

/// `"03 - March"` style month folder.
pub fn format_month_folder(month: u32) -> String {
    let name = u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("Unknown");
    format!("{:02} - {}", month, name)
}

fn format_date(date: NaiveDate, format: &str) -> String {
    let mut formatted = String::new();
    if write!(formatted, "{}", date.format(format)).is_err() {
        warn!("Invalid date format '{}', using ISO dates", format);
        return date.format("%Y-%m-%d").to_string();
    }
    formatted
}

/// Make a string safe as a file name stem: no invalid characters, no
/// whitespace, at most 200 characters, never empty.
pub fn sanitize_filename(name: &str) -> String {
    let name = name.strip_suffix(".pdf").unwrap_or(name);
    let sanitized = sanitize_for_filesystem(name);
    if sanitized == UNKNOWN_COMPANY && !name.contains(UNKNOWN_COMPANY) {
        return "document".to_string();
    }
    sanitized.chars().take(MAX_FILENAME_CHARS).collect()
}
