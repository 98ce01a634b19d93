use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

use super::canonical::{
    UNKNOWN_COMPANY, folder_name_to_company_name, is_unknown_company, normalize_for_comparison,
    proper_case, sanitize_for_filesystem,
};
use super::similarity::SimilarityScorer;

/// Default score a fuzzy match must reach to reuse an existing company.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// One known organization and every name it has been seen under.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyMapping {
    canonical_name: String,
    variations: BTreeSet<String>,
    folder_name: String,
}

impl CompanyMapping {
    /// Mapping whose folder name is derived from the canonical name.
    fn new(canonical_name: String) -> Self {
        let folder_name = sanitize_for_filesystem(&canonical_name);
        Self::with_folder(canonical_name, folder_name)
    }

    /// Mapping for a folder that already exists on disk.
    fn with_folder(canonical_name: String, folder_name: String) -> Self {
        let mut variations = BTreeSet::new();
        variations.insert(canonical_name.clone());
        Self {
            canonical_name,
            variations,
            folder_name,
        }
    }

    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    pub fn folder_name(&self) -> &str {
        &self.folder_name
    }

    pub fn variations(&self) -> &BTreeSet<String> {
        &self.variations
    }

    fn knows(&self, lowered: &str) -> bool {
        self.canonical_name.to_lowercase() == lowered
            || self.variations.iter().any(|v| v.to_lowercase() == lowered)
    }

    /// Highest score of `normalized` against the canonical name or any variation.
    fn best_score(&self, scorer: &SimilarityScorer, normalized: &str) -> f64 {
        std::iter::once(self.canonical_name.as_str())
            .chain(self.variations.iter().map(String::as_str))
            .map(|name| scorer.score(normalized, &normalize_for_comparison(name)))
            .fold(0.0, f64::max)
    }
}

/// How a raw company name would be resolved against the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Empty or placeholder input.
    Unknown,
    /// Case-insensitive match on a canonical name or variation.
    Exact { canonical: String },
    /// Similarity match at or above the threshold.
    Fuzzy { canonical: String, score: f64 },
    /// No match; a new company with this canonical name would be created.
    New { canonical: String },
}

impl Resolution {
    pub fn canonical_name(&self) -> &str {
        match self {
            Resolution::Unknown => UNKNOWN_COMPANY,
            Resolution::Exact { canonical }
            | Resolution::Fuzzy { canonical, .. }
            | Resolution::New { canonical } => canonical,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryStatistics {
    pub total_companies: usize,
    pub total_variations: usize,
    pub average_variations_per_company: f64,
    pub similarity_threshold: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanySummary {
    pub canonical_name: String,
    pub folder_name: String,
    pub variations: Vec<String>,
}

/// In-memory index of known companies for one output directory.
///
/// The directory tree is the durable state: the registry is rebuilt from it
/// with [`CompanyRegistry::scan_existing`] at the start of every session and
/// after folders are merged.
#[derive(Debug, Clone)]
pub struct CompanyRegistry {
    /// Mappings in registration order
    mappings: Vec<CompanyMapping>,
    /// Lowercased canonical name -> index into `mappings`
    by_canonical: HashMap<String, usize>,
    /// Normalized name -> canonical name
    normalized_to_canonical: HashMap<String, String>,
    similarity_threshold: f64,
    scorer: SimilarityScorer,
}

impl Default for CompanyRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl CompanyRegistry {
    pub fn new(similarity_threshold: f64) -> Self {
        Self::with_scorer(similarity_threshold, SimilarityScorer::default())
    }

    pub fn with_scorer(similarity_threshold: f64, scorer: SimilarityScorer) -> Self {
        Self {
            mappings: Vec::new(),
            by_canonical: HashMap::new(),
            normalized_to_canonical: HashMap::new(),
            similarity_threshold,
            scorer,
        }
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    /// Mappings in registration order.
    pub fn mappings(&self) -> &[CompanyMapping] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Seed the registry from the company folders under `output_dir`.
    ///
    /// Subdirectories are visited in name order. `Unknown`, hidden and
    /// non-UTF-8 folders are skipped. A missing directory is a fresh start
    /// and yields `Ok(0)`.
    pub fn scan_existing(&mut self, output_dir: &Path) -> io::Result<usize> {
        if !output_dir.exists() {
            info!(
                "Output directory {} doesn't exist yet, starting fresh",
                output_dir.display()
            );
            return Ok(0);
        }

        info!("Scanning existing companies in {}", output_dir.display());

        let mut folders = Vec::new();
        for entry in fs::read_dir(output_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!(
                    "Skipping folder with non UTF-8 name: {}",
                    entry.path().display()
                );
                continue;
            };

            if name == UNKNOWN_COMPANY || name.starts_with('.') {
                continue;
            }
            folders.push(name);
        }
        folders.sort();

        let found = folders.len();
        for folder in folders {
            let company_name = folder_name_to_company_name(&folder);
            debug!("Found existing company: {} -> {}", company_name, folder);

            let mut mapping = CompanyMapping::with_folder(company_name, folder.clone());
            mapping.variations.insert(folder);
            self.register(mapping);
        }

        info!("Found {} existing companies", self.mappings.len());
        Ok(found)
    }

    /// Forget every mapping.
    pub fn clear(&mut self) {
        self.mappings.clear();
        self.by_canonical.clear();
        self.normalized_to_canonical.clear();
    }

    /// Discard in-memory state and rebuild it from disk.
    pub fn rescan(&mut self, output_dir: &Path) -> io::Result<usize> {
        self.clear();
        self.scan_existing(output_dir)
    }

    /// Work out how `raw_name` would resolve without changing the registry.
    pub fn resolve(&self, raw_name: &str) -> Resolution {
        let name = raw_name.trim();
        if is_unknown_company(name) {
            return Resolution::Unknown;
        }

        if let Some(index) = self.find_exact(name) {
            return Resolution::Exact {
                canonical: self.mappings[index].canonical_name.clone(),
            };
        }

        if let Some((index, score)) = self.find_fuzzy(name) {
            return Resolution::Fuzzy {
                canonical: self.mappings[index].canonical_name.clone(),
                score,
            };
        }

        Resolution::New {
            canonical: proper_case(name),
        }
    }

    /// Resolve a raw company name to its canonical name, learning from it.
    ///
    /// Fuzzy matches record the raw name as a new variation; unmatched names
    /// register a new company. Never fails: placeholders give `"Unknown"`.
    pub fn normalize(&mut self, raw_name: &str) -> String {
        let name = raw_name.trim();
        if is_unknown_company(name) {
            return UNKNOWN_COMPANY.to_string();
        }

        if let Some(index) = self.find_exact(name) {
            let canonical = self.mappings[index].canonical_name.clone();
            debug!("Exact match found: {} -> {}", name, canonical);
            return canonical;
        }

        if let Some((index, score)) = self.find_fuzzy(name) {
            let mapping = &mut self.mappings[index];
            mapping.variations.insert(raw_name.to_string());
            info!(
                "Fuzzy match found: {} -> {} (score: {:.3})",
                name, mapping.canonical_name, score
            );
            return mapping.canonical_name.clone();
        }

        let canonical = proper_case(name);
        let mut mapping = CompanyMapping::new(canonical.clone());
        mapping.variations.insert(raw_name.to_string());
        self.register(mapping);

        info!("New company created: {} -> {}", name, canonical);
        canonical
    }

    /// Folder for a canonical name; unknown names get a sanitized fallback.
    pub fn folder_name(&self, canonical_name: &str) -> String {
        match self.by_canonical.get(&canonical_name.to_lowercase()) {
            Some(&index) => self.mappings[index].folder_name.clone(),
            None => sanitize_for_filesystem(canonical_name),
        }
    }

    /// Canonical name registered under a normalized comparison key.
    #[cfg(test)]
    pub fn canonical_for_normalized(&self, normalized: &str) -> Option<&str> {
        self.normalized_to_canonical
            .get(normalized)
            .map(String::as_str)
    }

    pub fn statistics(&self) -> RegistryStatistics {
        let total_companies = self.mappings.len();
        let total_variations: usize = self.mappings.iter().map(|m| m.variations.len()).sum();
        let average_variations_per_company = if total_companies == 0 {
            0.0
        } else {
            total_variations as f64 / total_companies as f64
        };

        RegistryStatistics {
            total_companies,
            total_variations,
            average_variations_per_company,
            similarity_threshold: self.similarity_threshold,
        }
    }

    /// Every company with its folder and variations, sorted by canonical name.
    pub fn list_companies(&self) -> Vec<CompanySummary> {
        let mut companies: Vec<CompanySummary> = self
            .mappings
            .iter()
            .map(|m| CompanySummary {
                canonical_name: m.canonical_name().to_string(),
                folder_name: m.folder_name().to_string(),
                variations: m.variations().iter().cloned().collect(),
            })
            .collect();
        companies.sort_by(|a, b| a.canonical_name.cmp(&b.canonical_name));
        companies
    }

    fn register(&mut self, mapping: CompanyMapping) {
        let key = mapping.canonical_name.to_lowercase();
        self.normalized_to_canonical.insert(
            normalize_for_comparison(&mapping.canonical_name),
            mapping.canonical_name.clone(),
        );

        if let Some(&index) = self.by_canonical.get(&key) {
            warn!(
                "Company {} registered twice; folder {} replaces {}",
                mapping.canonical_name, mapping.folder_name, self.mappings[index].folder_name
            );
            self.mappings[index] = mapping;
        } else {
            self.by_canonical.insert(key, self.mappings.len());
            self.mappings.push(mapping);
        }
    }

    fn find_exact(&self, name: &str) -> Option<usize> {
        let lowered = name.to_lowercase();
        if let Some(&index) = self.by_canonical.get(&lowered) {
            return Some(index);
        }
        self.mappings.iter().position(|m| m.knows(&lowered))
    }

    /// Best-scoring mapping at or above the threshold; earlier mappings win ties.
    fn find_fuzzy(&self, name: &str) -> Option<(usize, f64)> {
        let normalized = normalize_for_comparison(name);

        let mut best: Option<(usize, f64)> = None;
        for (index, mapping) in self.mappings.iter().enumerate() {
            let score = mapping.best_score(&self.scorer, &normalized);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }

        let (index, score) = best.filter(|&(_, score)| score >= self.similarity_threshold)?;
        debug!(
            "Fuzzy match: {} -> {} (score: {:.3})",
            name, self.mappings[index].canonical_name, score
        );
        Some((index, score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_chase_variants_share_one_company() {
        let mut registry = CompanyRegistry::new(0.8);
        let first = registry.normalize("Chase Bank");
        let second = registry.normalize("CHASE BANK INC");

        assert_eq!(first, "Chase Bank");
        assert_eq!(second, "Chase Bank");
        assert_eq!(registry.len(), 1);
        assert!(registry.mappings()[0].variations().len() >= 2);
        assert!(registry.mappings()[0].variations().contains("CHASE BANK INC"));
    }

    #[test]
    fn test_unrelated_companies_stay_separate() {
        let mut registry = CompanyRegistry::default();
        let acme = registry.normalize("Acme Corp");
        let other = registry.normalize("Completely Different Co");

        assert_ne!(acme, other);
        assert_eq!(acme, "Acme CORP");
        assert_eq!(other, "Completely Different Co");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_empty_output_dir_then_first_company() {
        let dir = tempdir().unwrap();
        let mut registry = CompanyRegistry::default();

        assert_eq!(registry.scan_existing(dir.path()).unwrap(), 0);
        assert!(registry.is_empty());

        assert_eq!(registry.normalize("Anything"), "Anything");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_missing_output_dir_is_fresh_start() {
        let dir = tempdir().unwrap();
        let mut registry = CompanyRegistry::default();
        let missing = dir.path().join("does-not-exist");

        assert_eq!(registry.scan_existing(&missing).unwrap(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_normalize_is_a_fixpoint() {
        let mut registry = CompanyRegistry::default();
        for raw in ["chase bank", "The Home Depot, Inc.", "t-mobile usa", "wells_fargo"] {
            let once = registry.normalize(raw);
            let twice = registry.normalize(&once);
            assert_eq!(once, twice, "re-normalizing {raw:?}");
        }
    }

    #[test]
    fn test_raising_threshold_stops_matching() {
        // "chase" vs "chase home" scores 0.55
        let mut lenient = CompanyRegistry::new(0.5);
        lenient.normalize("Chase");
        assert_eq!(lenient.normalize("Chase Home"), "Chase");
        assert_eq!(lenient.len(), 1);

        let mut strict = CompanyRegistry::new(0.6);
        strict.normalize("Chase");
        assert_eq!(strict.normalize("Chase Home"), "Chase Home");
        assert_eq!(strict.len(), 2);
    }

    #[test]
    fn test_fuzzy_ties_go_to_first_registered() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("Acme_East")).unwrap();
        fs::create_dir(dir.path().join("Acme_West")).unwrap();

        let mut registry = CompanyRegistry::new(0.5);
        registry.scan_existing(dir.path()).unwrap();

        // "acme" scores the same against "acme east" and "acme west"
        assert_eq!(registry.normalize("Acme"), "Acme East");
    }

    #[test]
    fn test_fuzzy_picks_highest_score() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("Acme_Holdings_Group")).unwrap();
        fs::create_dir(dir.path().join("Acme_Industries")).unwrap();

        let mut registry = CompanyRegistry::new(0.2);
        registry.scan_existing(dir.path()).unwrap();

        assert_eq!(registry.normalize("Acme Industries Inc"), "Acme Industries");
    }

    #[test]
    fn test_exact_match_on_variation() {
        let mut registry = CompanyRegistry::default();
        registry.normalize("Chase Bank");
        registry.normalize("CHASE BANK INC");
        registry.normalize("JPMorgan Chase Bank");
        assert_eq!(registry.len(), 2);

        assert_eq!(
            registry.resolve("chase bank inc"),
            Resolution::Exact {
                canonical: "Chase Bank".to_string()
            }
        );
    }

    #[test]
    fn test_placeholders_resolve_to_unknown() {
        let mut registry = CompanyRegistry::default();
        for raw in ["", "   ", "unknown", "NULL", "None"] {
            assert_eq!(registry.normalize(raw), "Unknown");
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resolve_does_not_mutate() {
        let mut registry = CompanyRegistry::default();
        registry.normalize("Chase Bank");

        match registry.resolve("CHASE BANK INC") {
            Resolution::Fuzzy { canonical, score } => {
                assert_eq!(canonical, "Chase Bank");
                assert!(score >= 0.8);
            }
            other => panic!("expected fuzzy match, got {other:?}"),
        }
        assert_eq!(
            registry.resolve("Globex"),
            Resolution::New {
                canonical: "Globex".to_string()
            }
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.mappings()[0].variations().len(), 1);
    }

    #[test]
    fn test_new_company_canonical_is_proper_cased() {
        let mut registry = CompanyRegistry::default();
        assert_eq!(registry.normalize("  bank of america usa  "), "Bank of America USA");
        assert_eq!(registry.folder_name("Bank of America USA"), "Bank_of_America_USA");
    }

    #[test]
    fn test_variations_keep_raw_input() {
        let mut registry = CompanyRegistry::default();
        registry.normalize("  bank of america usa  ");
        assert_eq!(registry.normalize(" BANK OF AMERICA USA INC"), "Bank of America USA");

        let variations = registry.mappings()[0].variations();
        assert!(variations.contains("  bank of america usa  "));
        assert!(variations.contains(" BANK OF AMERICA USA INC"));
        assert!(variations.contains("Bank of America USA"));
    }

    #[test]
    fn test_folder_name_fallback_is_sanitized() {
        let registry = CompanyRegistry::default();
        assert_eq!(registry.folder_name("Never: Seen/Before"), "Never__Seen_Before");
        assert_eq!(registry.folder_name(""), "Unknown");
    }

    #[test]
    fn test_scan_existing_reconstructs_companies() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("Wells_Fargo")).unwrap();
        fs::create_dir(dir.path().join("bank_of_america")).unwrap();
        fs::create_dir(dir.path().join("Unknown")).unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a company").unwrap();

        let mut registry = CompanyRegistry::default();
        assert_eq!(registry.scan_existing(dir.path()).unwrap(), 2);

        let names: Vec<&str> = registry
            .mappings()
            .iter()
            .map(CompanyMapping::canonical_name)
            .collect();
        assert_eq!(names, vec!["Wells Fargo", "Bank of America"]);

        assert_eq!(registry.folder_name("Bank of America"), "bank_of_america");
        assert_eq!(registry.normalize("wells_fargo"), "Wells Fargo");
        assert_eq!(registry.canonical_for_normalized("wells fargo"), Some("Wells Fargo"));
    }

    #[test]
    fn test_rescan_discards_learned_variations() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("Chase")).unwrap();

        let mut registry = CompanyRegistry::default();
        registry.scan_existing(dir.path()).unwrap();
        registry.normalize("Brand New Company");
        assert_eq!(registry.len(), 2);

        registry.rescan(dir.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.mappings()[0].canonical_name(), "Chase");
    }

    #[test]
    fn test_statistics_and_listing() {
        let mut registry = CompanyRegistry::new(0.8);
        assert_eq!(registry.statistics().average_variations_per_company, 0.0);

        registry.normalize("Zeta Systems");
        registry.normalize("Alpha Labs");
        registry.normalize("ALPHA LABS LLC");

        let stats = registry.statistics();
        assert_eq!(stats.total_companies, 2);
        assert_eq!(stats.total_variations, 3);
        assert!((stats.average_variations_per_company - 1.5).abs() < 1e-9);
        assert_eq!(stats.similarity_threshold, 0.8);

        let companies = registry.list_companies();
        assert_eq!(companies[0].canonical_name, "Alpha Labs");
        assert_eq!(companies[1].canonical_name, "Zeta Systems");
        assert_eq!(companies[0].folder_name, "Alpha_Labs");
    }
}
