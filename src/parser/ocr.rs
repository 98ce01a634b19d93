//! OCR for scanned PDFs via the `pdftoppm` and `tesseract` command-line tools.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info, warn};

const RENDER_DPI: u32 = 300;

/// Whether both `pdftoppm` (poppler-utils) and `tesseract` can be run.
pub fn is_ocr_available() -> bool {
    let pdftoppm = Command::new("pdftoppm").arg("-v").output().is_ok();
    let tesseract = Command::new("tesseract").arg("--version").output().is_ok();

    if !pdftoppm {
        debug!("pdftoppm not found - install poppler-utils for OCR support");
    }
    if !tesseract {
        debug!("tesseract not found - install tesseract-ocr for OCR support");
    }

    pdftoppm && tesseract
}

/// Render every page to PNG and OCR them in page order.
pub fn extract_text(path: &Path) -> Result<String> {
    let temp_dir = tempfile::tempdir().context("Failed to create OCR scratch directory")?;
    let output_prefix = temp_dir.path().join("page");

    info!("Starting OCR extraction for {}", path.display());

    let rendered = Command::new("pdftoppm")
        .arg("-png")
        .arg("-r")
        .arg(RENDER_DPI.to_string())
        .arg(path)
        .arg(&output_prefix)
        .output()
        .context("Failed to run pdftoppm")?;

    if !rendered.status.success() {
        anyhow::bail!(
            "pdftoppm failed: {}",
            String::from_utf8_lossy(&rendered.stderr).trim()
        );
    }

    // pdftoppm zero-pads page numbers, so name order is page order
    let mut images: Vec<_> = std::fs::read_dir(temp_dir.path())
        .context("Failed to read OCR scratch directory")?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    images.sort();

    if images.is_empty() {
        anyhow::bail!("pdftoppm produced no images for {}", path.display());
    }

    let mut pages = Vec::with_capacity(images.len());
    for (i, image) in images.iter().enumerate() {
        let output = Command::new("tesseract")
            .arg(image)
            .arg("stdout")
            .arg("--psm")
            .arg("6")
            .output()
            .with_context(|| format!("Failed to run tesseract on page {}", i + 1))?;

        if !output.status.success() {
            warn!(
                "Tesseract warning on page {}: {}",
                i + 1,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            continue;
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let text = text.trim();
        if !text.is_empty() {
            debug!("OCR extracted {} chars from page {}", text.len(), i + 1);
            pages.push(text.to_string());
        }
    }

    Ok(pages.join("\n"))
}
