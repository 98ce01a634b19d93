//! Company-name canonicalization, the persistent registry of known companies
//! and consolidation of duplicate company folders.

pub mod canonical;
pub mod merger;
pub mod registry;
pub mod similarity;

use std::path::Path;
use tracing::{info, warn};

pub use canonical::{UNKNOWN_COMPANY, sanitize_for_filesystem};
pub use merger::{DuplicateMerger, MergeOutcome, MergeReport};
pub use registry::{CompanyRegistry, DEFAULT_SIMILARITY_THRESHOLD, Resolution};

/// Knobs for company normalization taken from the `[organization]` config.
#[derive(Debug, Clone, Copy)]
pub struct NormalizationSettings {
    pub similarity_threshold: f64,
    pub auto_merge_duplicates: bool,
}

impl Default for NormalizationSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            auto_merge_duplicates: true,
        }
    }
}

/// Build the registry for an output directory: scan the existing company
/// folders, then merge near-duplicates when enabled.
///
/// Scan and merge problems are logged and never abort startup; an unreadable
/// output directory simply yields an empty registry.
pub fn load_registry(
    output_dir: &Path,
    settings: NormalizationSettings,
) -> (CompanyRegistry, Option<MergeReport>) {
    let mut registry = CompanyRegistry::new(settings.similarity_threshold);

    if let Err(e) = registry.scan_existing(output_dir) {
        warn!(
            "Could not scan existing companies in {}: {}",
            output_dir.display(),
            e
        );
        return (registry, None);
    }

    if !settings.auto_merge_duplicates {
        return (registry, None);
    }

    match DuplicateMerger::new(output_dir).run(&mut registry) {
        Ok(report) => {
            if report.merged_count() > 0 {
                info!(
                    "Merged {} duplicate company folders; {} companies remain",
                    report.merged_count(),
                    registry.len()
                );
            }
            (registry, Some(report))
        }
        Err(e) => {
            warn!("Duplicate folder merge failed: {}", e);
            (registry, None)
        }
    }
}
