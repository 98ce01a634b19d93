use anyhow::Result;
use console::{Emoji, style};
use std::path::PathBuf;

use super::resolve_output_dir;
use crate::organizer::{load_history, undo_all};

static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static REWIND: Emoji<'_, '_> = Emoji("⏪ ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");

pub async fn run(output: Option<PathBuf>) -> Result<()> {
    println!();
    println!("{}", style(" OCRganizer - Undo ").bold().reverse());
    println!();

    let output_dir = resolve_output_dir(output)?;
    println!("{}Output: {}", FOLDER, style(output_dir.display()).cyan());
    println!();

    let entries = load_history(&output_dir)?;
    if entries.is_empty() {
        println!("{}", style("Nothing to undo: no organization history found").yellow());
        println!();
        return Ok(());
    }

    println!(
        "{}Undoing {} recorded operations...",
        REWIND,
        style(entries.len()).cyan().bold()
    );
    let report = undo_all(&output_dir)?;

    println!(
        "{}Restored {} files",
        CHECK,
        style(report.restored).green().bold()
    );
    if report.copies_removed > 0 {
        println!(
            "{}Removed {} copies",
            CHECK,
            style(report.copies_removed).green().bold()
        );
    }
    if report.missing > 0 {
        println!(
            "{}{} organized files were not found and stay in the history",
            WARN,
            style(report.missing).yellow().bold()
        );
    }
    if !report.failed.is_empty() {
        println!(
            "{}{} files could not be restored and stay in the history:",
            WARN,
            style(report.failed.len()).red().bold()
        );
        for (path, reason) in &report.failed {
            println!(
                "  {} {}: {}",
                style("•").red(),
                path.display(),
                style(reason).dim()
            );
        }
    }
    println!();

    Ok(())
}
