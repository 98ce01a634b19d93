use anyhow::{Context, Result};
use console::{Emoji, style};
use serde_json::json;
use std::path::PathBuf;

use crate::company::{CompanyRegistry, Resolution};
use crate::config::Config;

static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static BUILDING: Emoji<'_, '_> = Emoji("🏢 ", "");
static LINK: Emoji<'_, '_> = Emoji("🔗 ", "");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");

pub async fn run(output: Option<PathBuf>, json: bool, resolve: Option<String>) -> Result<()> {
    let config = Config::load_or_default()?;
    let output_dir = output.unwrap_or_else(|| config.files.output_dir.clone());

    let mut registry = CompanyRegistry::new(config.organization.company_similarity_threshold);
    registry
        .scan_existing(&output_dir)
        .with_context(|| format!("Failed to scan {}", output_dir.display()))?;

    let resolution = resolve.as_deref().map(|name| (name, registry.resolve(name)));

    if json {
        let mut value = json!({
            "output_dir": output_dir,
            "statistics": registry.statistics(),
            "companies": registry.list_companies(),
        });
        if let Some((name, ref resolution)) = resolution {
            value["resolution"] = resolution_json(&registry, name, resolution);
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("{}", style(" OCRganizer - Companies ").bold().reverse());
    println!();
    println!("{}Output: {}", FOLDER, style(output_dir.display()).cyan());
    println!();

    if registry.is_empty() {
        println!("{}", style("No company folders found").yellow());
    } else {
        println!("{}Known companies:", BUILDING);
        for company in registry.list_companies() {
            println!(
                "  {} {} {}",
                style("•").cyan(),
                style(&company.canonical_name).green().bold(),
                style(format!("({}/)", company.folder_name)).dim()
            );
            let aliases: Vec<&str> = company
                .variations
                .iter()
                .map(String::as_str)
                .filter(|v| *v != company.canonical_name && *v != company.folder_name)
                .collect();
            if !aliases.is_empty() {
                println!("    {} {}", style("also:").dim(), aliases.join(", "));
            }
        }

        let stats = registry.statistics();
        println!();
        println!(
            "  {} companies, {} name variations, threshold {:.2}",
            style(stats.total_companies).green().bold(),
            style(stats.total_variations).cyan(),
            stats.similarity_threshold
        );
    }

    if let Some((name, resolution)) = resolution {
        println!();
        print_resolution(&registry, name, &resolution);
    }
    println!();

    Ok(())
}

fn resolution_json(registry: &CompanyRegistry, name: &str, resolution: &Resolution) -> serde_json::Value {
    let (kind, score) = match resolution {
        Resolution::Unknown => ("unknown", None),
        Resolution::Exact { .. } => ("exact", None),
        Resolution::Fuzzy { score, .. } => ("fuzzy", Some(*score)),
        Resolution::New { .. } => ("new", None),
    };
    let canonical = resolution.canonical_name();
    json!({
        "input": name,
        "match": kind,
        "canonical_name": canonical,
        "folder_name": registry.folder_name(canonical),
        "score": score,
    })
}

fn print_resolution(registry: &CompanyRegistry, name: &str, resolution: &Resolution) {
    let canonical = resolution.canonical_name();
    let folder = registry.folder_name(canonical);
    let detail = match resolution {
        Resolution::Unknown => style("placeholder name, filed as Unknown".to_string()).yellow(),
        Resolution::Exact { .. } => style("exact match".to_string()).green(),
        Resolution::Fuzzy { score, .. } => style(format!("fuzzy match, score {:.3}", score)).green(),
        Resolution::New { .. } => style("no match, would create a new company".to_string()).yellow(),
    };

    let marker = if matches!(resolution, Resolution::Unknown) {
        WARN
    } else {
        LINK
    };
    println!(
        "{}{} {} {} ({})",
        marker,
        style(name).cyan(),
        style("→").cyan(),
        style(canonical).green().bold(),
        detail
    );
    println!("   folder: {}", style(format!("{}/", folder)).dim());
}
