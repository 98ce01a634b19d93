use anyhow::{Context, Result};
use console::{Emoji, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::time::Duration;

use crate::config::Config;
use crate::parser::is_ocr_available;

static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
static KEY: Emoji<'_, '_> = Emoji("🔑 ", "");

pub async fn run(force: bool) -> Result<()> {
    println!();
    println!("{}", style(" OCRganizer - Initialization ").bold().reverse());
    println!();

    let config_dir = Config::config_dir()?;
    let config_path = config_dir.join("config.toml");

    if config_path.exists() && !force {
        println!(
            "{}Configuration already exists at {}",
            WARN,
            style(config_path.display()).cyan()
        );
        println!("  Use {} to overwrite", style("--force").yellow());
        return Ok(());
    }

    fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner().template(&format!("{}{{spinner:.green}} {{msg}}", GEAR))?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Creating configuration...");

    let config_content = toml::to_string_pretty(&Config::default())?;
    fs::write(&config_path, config_content).context("Failed to write config file")?;
    spinner.finish_and_clear();

    println!(
        "{}Created configuration at {}",
        CHECK,
        style(config_path.display()).cyan()
    );

    if !is_ocr_available() {
        println!();
        println!(
            "{}OCR tools not found. Scanned PDFs need {} and {}:",
            WARN,
            style("tesseract").yellow(),
            style("pdftoppm").yellow()
        );
        println!("  {} brew install tesseract poppler", style("$").dim());
        println!("  {} sudo apt install tesseract-ocr poppler-utils", style("$").dim());
    }

    println!();
    println!("{}", style("━".repeat(50)).dim());
    println!();
    println!("{}Next steps:", ROCKET);
    println!();
    println!("  {}Set an API key for your provider:", KEY);
    println!("    {} export OPENAI_API_KEY=sk-...", style("$").dim());
    println!("    {} export ANTHROPIC_API_KEY=sk-ant-...", style("$").dim());
    println!();
    println!("  {}Organize your first folder of PDFs:", ROCKET);
    println!("    {} ocrganizer organize ./inbox -o ./organized --dry-run", style("$").dim());
    println!();

    Ok(())
}
