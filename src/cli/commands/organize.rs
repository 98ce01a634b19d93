use anyhow::{Context, Result};
use console::{Emoji, style};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::warn;

use super::merge::print_report;
use crate::cli::LlmProvider;
use crate::config::Config;
use crate::llm::{DocumentInfo, LlmClient};
use crate::organizer::{FileOrganizer, OrganizationStrategy, OrganizationSummary, TransferMode};
use crate::parser::{PdfDocument, PdfProcessor, collect_pdfs, is_ocr_available};

static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
static PAPER: Emoji<'_, '_> = Emoji("📄 ", "");
static BRAIN: Emoji<'_, '_> = Emoji("🧠 ", "");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static LINK: Emoji<'_, '_> = Emoji("🔗 ", "");
static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");

/// Command-line overrides applied on top of the config file.
pub struct OrganizeOptions {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub provider: Option<LlmProvider>,
    pub model: Option<String>,
    pub dry_run: bool,
    pub copy: bool,
    pub structure: Option<String>,
    pub filename: Option<String>,
    pub threshold: Option<f64>,
    pub no_normalize: bool,
    pub no_merge: bool,
    pub concurrency: usize,
}

impl OrganizeOptions {
    fn apply(&self, config: &mut Config) {
        if let Some(ref output) = self.output {
            config.files.output_dir = output.clone();
        }
        if let Some(ref structure) = self.structure {
            config.organization.structure_pattern = structure.clone();
        }
        if let Some(ref filename) = self.filename {
            config.organization.filename_pattern = filename.clone();
        }
        if let Some(threshold) = self.threshold {
            config.organization.company_similarity_threshold = threshold;
        }
        if self.no_normalize {
            config.organization.enable_company_normalization = false;
        }
        // A dry run must leave existing folders alone.
        if self.no_merge || self.dry_run {
            config.organization.auto_merge_duplicates = false;
        }
        if self.copy {
            config.files.copy_mode = true;
        }
        if let Some(provider) = self.provider {
            config.default_provider = provider.to_string();
        }
    }
}

pub async fn run(options: OrganizeOptions) -> Result<()> {
    let started = Instant::now();

    println!();
    println!("{}", style(" OCRganizer - PDF Organizer ").bold().reverse());
    println!();

    let mut config = Config::load_or_default()?;
    options.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let provider: LlmProvider = config.default_provider.parse()?;
    let model = options.model.clone().or(config.default_model.clone());
    let model_display = model
        .clone()
        .or_else(|| {
            config
                .get_provider(&config.default_provider)
                .and_then(|p| p.model.clone())
        })
        .unwrap_or_else(|| "default".to_string());
    let output_dir = config.files.output_dir.clone();
    let mode = if config.files.copy_mode {
        TransferMode::Copy
    } else {
        TransferMode::Move
    };

    println!("{}Provider: {}", BRAIN, style(provider.to_string()).cyan().bold());
    println!("{}Model: {}", BRAIN, style(&model_display).cyan());
    println!("{}Source: {}", PAPER, style(options.input.display()).cyan());
    println!("{}Output: {}", FOLDER, style(output_dir.display()).cyan());
    if options.concurrency > 1 {
        println!("{}Concurrency: {}", BRAIN, style(options.concurrency).cyan());
    }
    if options.dry_run {
        println!("{}Mode: {}", WARN, style("dry run (no files are touched)").yellow());
    } else if mode == TransferMode::Copy {
        println!("{}Mode: {}", FOLDER, style("copy (originals are kept)").yellow());
    }
    if config.processing.enable_ocr && !is_ocr_available() {
        println!(
            "{}OCR tools not found; scanned PDFs will be filed as {}",
            WARN,
            style("Unknown").yellow()
        );
    }
    println!();

    // Collect PDFs
    print!("{}Scanning for PDFs... ", LOOKING_GLASS);
    let candidates = collect_pdfs(&options.input)?;
    let processor = PdfProcessor::new(
        config.processing.enable_ocr,
        config.processing.min_text_length,
        config.files.max_file_size_mb,
    );
    let pdfs: Vec<PathBuf> = candidates
        .into_iter()
        .filter(|path| processor.is_valid_pdf(path))
        .collect();
    println!("{}", style(format!("found {}", pdfs.len())).green().bold());

    if pdfs.is_empty() {
        println!();
        println!("{}", style("No valid PDF files found").yellow());
        return Ok(());
    }

    // Extract text, one file at a time
    let documents = extract_all(&processor, &pdfs)?;
    let ocr_count = documents.iter().filter(|d| d.used_ocr).count();
    println!(
        "{}Extracted text from {} documents ({} via OCR)",
        CHECK,
        style(documents.len()).green().bold(),
        style(ocr_count).cyan()
    );

    if documents.is_empty() {
        return Ok(());
    }

    // Classify
    let llm_client = Arc::new(LlmClient::new(provider, &config, model.as_deref())?);
    println!();
    println!("{}Analyzing documents with {}...", BRAIN, llm_client.provider_name());
    let analyzed = analyze_all(
        llm_client,
        documents,
        config.processing.max_text_for_ai,
        options.concurrency.max(1),
    )
    .await?;

    // Place
    println!();
    let mut organizer = FileOrganizer::new(
        &output_dir,
        OrganizationStrategy::from(&config.organization),
        config.organization.normalization(),
    )?;

    if let Some(report) = organizer.take_merge_report()
        && !report.attempts.is_empty()
    {
        println!("{}Consolidated duplicate company folders:", LINK);
        print_report(&report);
        println!();
    }
    if let Some(registry) = organizer.registry() {
        println!(
            "{}Matching against {} known companies (threshold {:.2})",
            LINK,
            style(registry.len()).cyan().bold(),
            registry.similarity_threshold()
        );
    }

    let confidence_threshold = config.processing.confidence_threshold;
    let mut failures = 0usize;

    for (document, info) in &analyzed {
        let name = file_name(&document.path);
        let low_confidence = info.confidence_score < confidence_threshold;

        if options.dry_run {
            let planned = organizer.plan_destination(info);
            print_placement(&name, organizer.output_dir(), &planned.path, low_confidence);
            continue;
        }

        match organizer.organize_file(document, info, mode) {
            Ok(target) => {
                print_placement(&name, organizer.output_dir(), &target, low_confidence)
            }
            Err(e) => {
                warn!("Failed to organize {}: {:#}", document.path.display(), e);
                println!("  {}{}", WARN, style(format!("{}: {:#}", name, e)).red());
                failures += 1;
            }
        }
    }

    if !options.dry_run {
        organizer
            .save_history()
            .context("Failed to save organization history")?;
    }

    print_summary(&organizer.summary(), options.dry_run, failures);

    println!();
    println!(
        "{}Done in {}",
        SPARKLE,
        style(HumanDuration(started.elapsed())).green().bold()
    );

    Ok(())
}

fn extract_all(processor: &PdfProcessor, pdfs: &[PathBuf]) -> Result<Vec<PdfDocument>> {
    let pb = ProgressBar::new(pdfs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{}{{spinner:.green}} [{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos}}/{{len}} {{msg}}",
                PAPER
            ))?
            .progress_chars("━━╸━"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let mut documents = Vec::with_capacity(pdfs.len());
    for path in pdfs {
        pb.set_message(format!("{}", style(file_name(path)).dim()));
        match processor.process(path) {
            Ok(document) => documents.push(document),
            Err(e) => {
                pb.suspend(|| {
                    println!("  {}{}", WARN, style(format!("{}: {:#}", file_name(path), e)).red())
                });
                warn!("Skipping {}: {:#}", path.display(), e);
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(documents)
}

/// Classify every document with at most `concurrency` requests in flight.
/// Results come back in input order.
async fn analyze_all(
    client: Arc<LlmClient>,
    documents: Vec<PdfDocument>,
    max_text_for_ai: usize,
    concurrency: usize,
) -> Result<Vec<(Arc<PdfDocument>, DocumentInfo)>> {
    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{}{{spinner:.green}} [{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos}}/{{len}}",
                BRAIN
            ))?
            .progress_chars("━━╸━"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks = Vec::with_capacity(documents.len());

    for document in documents {
        let document = Arc::new(document);
        let permit = semaphore.clone().acquire_owned().await?;
        let client = client.clone();
        let task_document = document.clone();
        let pb = pb.clone();

        let task = tokio::spawn(async move {
            let _permit = permit;
            let info = client.analyze(&task_document, max_text_for_ai).await;
            pb.inc(1);
            info
        });

        tasks.push((document, task));
    }

    let mut analyzed = Vec::with_capacity(tasks.len());
    for (document, task) in tasks {
        let info = match task.await {
            Ok(info) => info,
            Err(e) => {
                warn!("Analysis task for {} panicked: {}", document.path.display(), e);
                DocumentInfo::fallback(&document)
            }
        };
        analyzed.push((document, info));
    }
    pb.finish_and_clear();

    let fallbacks = analyzed.iter().filter(|(_, info)| info.is_fallback()).count();
    println!(
        "{}Classified {} documents",
        CHECK,
        style(analyzed.len() - fallbacks).green().bold()
    );
    if fallbacks > 0 {
        println!(
            "{}{} documents could not be classified and go to {}",
            WARN,
            style(fallbacks).yellow().bold(),
            style("Unknown").yellow()
        );
    }

    Ok(analyzed)
}

fn print_placement(name: &str, output_dir: &Path, target: &Path, low_confidence: bool) {
    let relative = target.strip_prefix(output_dir).unwrap_or(target);
    let marker = if low_confidence {
        style(" (low confidence)").yellow().to_string()
    } else {
        String::new()
    };
    println!(
        "  {} {} {} {}{}",
        style("•").cyan(),
        style(name).dim(),
        style("→").cyan(),
        style(relative.display()).green(),
        marker
    );
}

fn print_summary(summary: &OrganizationSummary, dry_run: bool, failures: usize) {
    println!();
    println!("{}Summary:", SPARKLE);
    if dry_run {
        println!("  {} {}", style("•").cyan(), style("Dry run, nothing was moved").yellow());
    } else {
        println!(
            "  {} Files organized: {}",
            style("•").cyan(),
            style(summary.total_organized).green().bold()
        );
        println!(
            "  {} Companies: {}",
            style("•").cyan(),
            style(summary.unique_companies).green().bold()
        );
        println!(
            "  {} Document types: {}",
            style("•").cyan(),
            style(summary.unique_document_types).green().bold()
        );
    }
    if let Some(ref stats) = summary.normalization {
        println!(
            "  {} Known companies: {} ({} name variations, threshold {:.2})",
            style("•").cyan(),
            style(stats.total_companies).green().bold(),
            stats.total_variations,
            stats.similarity_threshold
        );
    }
    if failures > 0 {
        println!(
            "  {} Failed: {}",
            style("•").cyan(),
            style(failures).red().bold()
        );
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> OrganizeOptions {
        OrganizeOptions {
            input: PathBuf::from("inbox"),
            output: None,
            provider: None,
            model: None,
            dry_run: false,
            copy: false,
            structure: None,
            filename: None,
            threshold: None,
            no_normalize: false,
            no_merge: false,
            concurrency: 4,
        }
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let mut config = Config::default();
        let options = OrganizeOptions {
            output: Some(PathBuf::from("sorted")),
            provider: Some(LlmProvider::Anthropic),
            structure: Some("{company}/{type}".to_string()),
            threshold: Some(0.9),
            no_merge: true,
            copy: true,
            ..options()
        };

        options.apply(&mut config);

        assert_eq!(config.files.output_dir, PathBuf::from("sorted"));
        assert_eq!(config.default_provider, "anthropic");
        assert_eq!(config.organization.structure_pattern, "{company}/{type}");
        assert_eq!(config.organization.company_similarity_threshold, 0.9);
        assert!(!config.organization.auto_merge_duplicates);
        assert!(config.organization.enable_company_normalization);
        assert!(config.files.copy_mode);
    }

    #[test]
    fn test_dry_run_never_merges() {
        let mut config = Config::default();
        OrganizeOptions {
            dry_run: true,
            ..options()
        }
        .apply(&mut config);
        assert!(!config.organization.auto_merge_duplicates);
    }

    #[test]
    fn test_no_normalize_disables_registry() {
        let mut config = Config::default();
        OrganizeOptions {
            no_normalize: true,
            ..options()
        }
        .apply(&mut config);
        assert!(config.organization.normalization().is_none());
    }

    #[test]
    fn test_defaults_leave_config_untouched() {
        let mut config = Config::default();
        options().apply(&mut config);
        assert_eq!(config.files.output_dir, PathBuf::from("output"));
        assert_eq!(config.default_provider, "openai");
        assert!(config.organization.auto_merge_duplicates);
    }
}
