use anyhow::{Context, Result};
use console::{Emoji, style};
use std::path::PathBuf;

use crate::company::merger::MergeCandidate;
use crate::company::{
    CompanyRegistry, DEFAULT_SIMILARITY_THRESHOLD, DuplicateMerger, MergeOutcome, MergeReport,
};
use crate::config::Config;
use crate::organizer::relocate_history;

static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

pub async fn run(output: Option<PathBuf>, dry_run: bool) -> Result<()> {
    println!();
    println!("{}", style(" OCRganizer - Merge Duplicate Companies ").bold().reverse());
    println!();

    let config = Config::load_or_default()?;
    let output_dir = output.unwrap_or_else(|| config.files.output_dir.clone());
    let threshold = if (0.0..=1.0).contains(&config.organization.company_similarity_threshold) {
        config.organization.company_similarity_threshold
    } else {
        DEFAULT_SIMILARITY_THRESHOLD
    };

    println!("{}Output: {}", FOLDER, style(output_dir.display()).cyan());

    let mut registry = CompanyRegistry::new(threshold);
    let found = registry
        .scan_existing(&output_dir)
        .with_context(|| format!("Failed to scan {}", output_dir.display()))?;
    println!(
        "{}Scanned {} company folders",
        LOOKING_GLASS,
        style(found).green().bold()
    );
    println!();

    let merger = DuplicateMerger::new(&output_dir);

    if dry_run {
        let candidates = merger.find_candidates(&registry);
        if candidates.is_empty() {
            println!("{}No duplicate company folders found", CHECK);
        } else {
            println!(
                "{}Would merge {} pair(s):",
                LOOKING_GLASS,
                style(candidates.len()).yellow().bold()
            );
            for candidate in &candidates {
                print_candidate(candidate);
            }
            println!();
            println!("  Run without {} to apply", style("--dry-run").yellow());
        }
        println!();
        return Ok(());
    }

    let report = merger
        .run(&mut registry)
        .with_context(|| format!("Failed to rescan {}", output_dir.display()))?;
    print_report(&report);

    let relocated = relocate_history(&output_dir, &report)?;
    if relocated > 0 {
        println!(
            "  {}Updated {} undo history entries",
            CHECK,
            style(relocated).cyan()
        );
    }

    println!();
    println!(
        "{}{} companies remain",
        SPARKLE,
        style(registry.len()).green().bold()
    );
    println!();

    Ok(())
}

fn print_candidate(candidate: &MergeCandidate) {
    println!(
        "  {} {} {} {} ({:.2})",
        style("•").cyan(),
        style(candidate.first.folder_name()).cyan(),
        style("≈").dim(),
        style(candidate.second.folder_name()).cyan(),
        candidate.similarity
    );
}

/// Print one line per merge attempt followed by the totals.
pub(crate) fn print_report(report: &MergeReport) {
    if report.attempts.is_empty() {
        println!("{}No duplicate company folders found", CHECK);
        return;
    }

    for attempt in &report.attempts {
        match &attempt.outcome {
            MergeOutcome::Success {
                kept,
                removed,
                moved,
            } => println!(
                "  {}Merged {} into {} ({} files, similarity {:.2})",
                CHECK,
                style(removed).yellow(),
                style(kept).green(),
                moved.len(),
                attempt.candidate.similarity
            ),
            MergeOutcome::PartialFailure {
                kept,
                removed,
                moved,
                files_remaining,
                cause,
            } => println!(
                "  {}{}",
                WARN,
                style(format!(
                    "Merge of {} into {} stopped after {} files ({} left): {}",
                    removed,
                    kept,
                    moved.len(),
                    files_remaining,
                    cause
                ))
                .red()
            ),
            MergeOutcome::NotFound { missing } => println!(
                "  {}{}",
                WARN,
                style(format!(
                    "Skipped {} / {}, folder already gone: {}",
                    attempt.candidate.first.folder_name(),
                    attempt.candidate.second.folder_name(),
                    missing.display()
                ))
                .dim()
            ),
        }
    }

    println!();
    print!(
        "  {} merged",
        style(report.merged_count()).green().bold()
    );
    if report.failed_count() > 0 {
        print!(", {} failed", style(report.failed_count()).red().bold());
    }
    if report.skipped_count() > 0 {
        print!(", {} skipped", style(report.skipped_count()).yellow().bold());
    }
    println!();
}
