use anyhow::Result;
use console::{Emoji, style};
use std::fs;
use std::process::Command;
use std::time::Duration;

use crate::config::{Config, ProviderConfig};
use crate::llm::is_local_url;
use crate::organizer::{HISTORY_FILE, load_history};

static DOCTOR: Emoji<'_, '_> = Emoji("🩺 ", "");
static PASS: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static FAIL: Emoji<'_, '_> = Emoji("❌ ", "[!!] ");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[i] ");
static ARROW: Emoji<'_, '_> = Emoji("   → ", "  -> ");

#[derive(Default)]
struct Tally {
    pass: u32,
    fail: u32,
    warn: u32,
}

pub async fn run() -> Result<()> {
    println!();
    println!("{}", style(" OCRganizer Doctor ").bold().reverse());
    println!();
    println!("{}Running diagnostics...", DOCTOR);
    println!();

    let mut tally = Tally::default();

    // ── 1. Binary version ────────────────────────────────────────────
    print_section("Binary");
    pass(&format!("ocrganizer {}", env!("CARGO_PKG_VERSION")), &mut tally);

    // ── 2. Config file ───────────────────────────────────────────────
    print_section("Configuration");

    let config_path = Config::config_path().ok();

    let config = match config_path {
        Some(ref path) if path.exists() => {
            pass(
                &format!("Config found at {}", style(path.display()).dim()),
                &mut tally,
            );
            match Config::load() {
                Ok(c) => {
                    pass(
                        &format!("Config is valid TOML (provider: {})", c.default_provider),
                        &mut tally,
                    );
                    match c.validate() {
                        Ok(()) => pass("Config values are in range", &mut tally),
                        Err(e) => {
                            fail(&format!("{:#}", e), &mut tally);
                            hint(&format!("Edit {}", path.display()));
                        }
                    }
                    Some(c)
                }
                Err(e) => {
                    fail(&format!("Config parse error: {:#}", e), &mut tally);
                    hint("Run: ocrganizer init --force");
                    None
                }
            }
        }
        Some(_) => {
            warn("Config file not found, built-in defaults apply", &mut tally);
            hint("Run: ocrganizer init");
            Some(Config::load_or_default()?)
        }
        None => {
            fail("Cannot determine config directory", &mut tally);
            None
        }
    };

    // ── 3. AI providers ──────────────────────────────────────────────
    print_section("AI Providers");

    if let Some(ref config) = config {
        for (name, env_var) in [("openai", "OPENAI_API_KEY"), ("anthropic", "ANTHROPIC_API_KEY")] {
            let active = config.default_provider.eq_ignore_ascii_case(name);
            check_provider(name, config.get_provider(name), env_var, active, &mut tally).await;
        }
    } else {
        warn("Skipping provider checks (no config)", &mut tally);
    }

    // ── 4. OCR tools ─────────────────────────────────────────────────
    print_section("OCR");

    let ocr_enabled = config.as_ref().is_none_or(|c| c.processing.enable_ocr);
    for (tool, args) in [("tesseract", ["--version"]), ("pdftoppm", ["-v"])] {
        if let Some(version) = command_version(tool, &args) {
            pass(&format!("{} installed ({})", tool, version), &mut tally);
        } else if ocr_enabled {
            warn(&format!("{} not found; scanned PDFs cannot be read", tool), &mut tally);
            hint("Install with: brew install tesseract poppler");
        } else {
            info(&format!("{} not found (OCR disabled in config)", tool));
        }
    }

    // ── 5. Output directory ──────────────────────────────────────────
    print_section("Output");

    if let Some(ref config) = config {
        let output_dir = &config.files.output_dir;
        if output_dir.is_dir() {
            let companies = fs::read_dir(output_dir)
                .map(|entries| {
                    entries
                        .filter_map(|e| e.ok())
                        .filter(|e| e.path().is_dir())
                        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
                        .count()
                })
                .unwrap_or(0);
            pass(
                &format!(
                    "Output directory {} ({} company folders)",
                    style(output_dir.display()).dim(),
                    companies
                ),
                &mut tally,
            );

            match load_history(output_dir) {
                Ok(entries) if entries.is_empty() => info("No organization history"),
                Ok(entries) => info(&format!(
                    "{} operations recorded in {} (undo available)",
                    entries.len(),
                    HISTORY_FILE
                )),
                Err(e) => {
                    warn(&format!("History file unreadable: {:#}", e), &mut tally);
                    hint(&format!("Remove {} to start fresh", HISTORY_FILE));
                }
            }
        } else if output_dir.exists() {
            fail(
                &format!("Output path {} is not a directory", output_dir.display()),
                &mut tally,
            );
        } else {
            info(&format!(
                "Output directory {} does not exist yet (created on first run)",
                output_dir.display()
            ));
        }
    }

    // ── 6. System info ───────────────────────────────────────────────
    print_section("System");

    info(&format!("OS: {} {}", std::env::consts::OS, std::env::consts::ARCH));

    if let Ok(cwd) = std::env::current_dir() {
        info(&format!("Working directory: {}", cwd.display()));
    }

    if let Some(ref path) = config_path {
        info(&format!("Config path: {}", path.display()));
    }

    // ── Summary ──────────────────────────────────────────────────────
    println!();
    println!("{}", style("━".repeat(50)).dim());
    println!();

    let total = tally.pass + tally.fail + tally.warn;
    print!(
        "  {} {} passed",
        style(tally.pass).green().bold(),
        if tally.pass == 1 { "check" } else { "checks" }
    );
    if tally.warn > 0 {
        print!(
            ", {} {}",
            style(tally.warn).yellow().bold(),
            if tally.warn == 1 { "warning" } else { "warnings" }
        );
    }
    if tally.fail > 0 {
        print!(
            ", {} {}",
            style(tally.fail).red().bold(),
            if tally.fail == 1 { "failure" } else { "failures" }
        );
    }
    println!(" ({}  total)", total);
    println!();

    if tally.fail > 0 {
        println!(
            "  {}",
            style("Some checks failed. Fix the issues above and re-run:").red()
        );
        println!("    {} ocrganizer doctor", style("$").dim());
    } else if tally.warn > 0 {
        println!(
            "  {}",
            style("Everything essential works, but there are some warnings.").yellow()
        );
    } else {
        println!(
            "  {}",
            style("All checks passed! You're ready to go.").green().bold()
        );
    }
    println!();

    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────

fn print_section(name: &str) {
    println!("  {}", style(name).bold().underlined());
}

fn pass(msg: &str, tally: &mut Tally) {
    println!("  {}{}", PASS, msg);
    tally.pass += 1;
}

fn fail(msg: &str, tally: &mut Tally) {
    println!("  {}{}", FAIL, style(msg).red());
    tally.fail += 1;
}

fn warn(msg: &str, tally: &mut Tally) {
    println!("  {}{}", WARN, style(msg).yellow());
    tally.warn += 1;
}

fn info(msg: &str) {
    println!("  {}{}", INFO, style(msg).dim());
}

fn hint(msg: &str) {
    println!("{}{}", ARROW, style(msg).dim());
}

/// First line of the tool's version output; `pdftoppm` prints it on stderr.
fn command_version(cmd: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(cmd).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).into_owned()
    } else {
        String::from_utf8_lossy(&output.stdout).into_owned()
    };
    Some(text.lines().next().unwrap_or_default().trim().to_string())
}

async fn check_http_get(url: &str) -> Result<u16, ()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|_| ())?;

    client
        .get(url)
        .send()
        .await
        .map(|r| r.status().as_u16())
        .map_err(|_| ())
}

async fn check_provider(
    name: &str,
    provider: Option<&ProviderConfig>,
    env_var: &str,
    active: bool,
    tally: &mut Tally,
) {
    let label = if active {
        format!("{} (default)", name)
    } else {
        name.to_string()
    };

    let Some(provider) = provider else {
        if active {
            fail(&format!("{} is not configured", label), tally);
            hint("Run: ocrganizer init --force");
        } else {
            info(&format!("{} not configured", label));
        }
        return;
    };

    if let Some(base_url) = provider.base_url.as_deref()
        && is_local_url(base_url)
    {
        match check_http_get(&format!("{}/models", base_url.trim_end_matches('/'))).await {
            Ok(200) => pass(&format!("{} local server running at {}", label, base_url), tally),
            Ok(status) => warn(
                &format!("{} local server responded with status {} at {}", label, status, base_url),
                tally,
            ),
            Err(_) if active => {
                fail(&format!("{} local server not reachable at {}", label, base_url), tally);
                hint("Start LM Studio and load a model");
            }
            Err(_) => info(&format!("{} local server not reachable at {}", label, base_url)),
        }
        return;
    }

    if !provider.api_key.is_empty() && !provider.api_key.starts_with('$') {
        pass(&format!("{} API key configured", label), tally);
    } else if active {
        fail(&format!("{} API key missing", label), tally);
        hint(&format!("Set {} or api_key in the config file", env_var));
    } else {
        info(&format!("{} API key not set ({})", label, env_var));
    }
}
