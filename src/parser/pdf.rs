use anyhow::{Context, Result};
use std::path::Path;

/// Extract the embedded text layer of a PDF file
pub fn extract_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read PDF file: {}", path.display()))?;

    // pdf_extract panics on some malformed files
    let text = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(&bytes)
    }))
    .map_err(|_| anyhow::anyhow!("PDF parser panicked on {}", path.display()))?
    .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;

    Ok(clean_pdf_text(&text))
}

/// Trim lines, drop blank ones, collapse runs of spaces and strip NUL/BOM artifacts
pub fn clean_pdf_text(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .replace('\u{0}', "")
        .replace('\u{FEFF}', "")
}
