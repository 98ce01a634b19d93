mod ocr;
mod pdf;

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub use ocr::is_ocr_available;

/// Text pulled out of one PDF.
#[derive(Debug, Clone, Serialize)]
pub struct PdfDocument {
    pub path: PathBuf,
    pub text: String,
    pub file_size: u64,
    pub used_ocr: bool,
}

impl PdfDocument {
    /// File name without extension, used as the fallback document name.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

/// Extracts text from PDFs, falling back to OCR for scanned documents.
pub struct PdfProcessor {
    enable_ocr: bool,
    min_text_length: usize,
    max_file_size_mb: u64,
}

impl Default for PdfProcessor {
    fn default() -> Self {
        Self::new(true, 100, 50)
    }
}

impl PdfProcessor {
    pub fn new(enable_ocr: bool, min_text_length: usize, max_file_size_mb: u64) -> Self {
        Self {
            enable_ocr,
            min_text_length,
            max_file_size_mb,
        }
    }

    /// Cheap check before processing: extension, size limit and `%PDF` header.
    pub fn is_valid_pdf(&self, path: &Path) -> bool {
        if !has_pdf_extension(path) {
            return false;
        }

        let Ok(metadata) = path.metadata() else {
            return false;
        };
        if !metadata.is_file() {
            return false;
        }
        if metadata.len() > self.max_file_size_mb * 1024 * 1024 {
            warn!(
                "Skipping {}: larger than {} MB",
                path.display(),
                self.max_file_size_mb
            );
            return false;
        }

        let mut header = [0u8; 4];
        match File::open(path).and_then(|mut f| f.read_exact(&mut header)) {
            Ok(()) => &header == b"%PDF",
            Err(_) => false,
        }
    }

    /// Extract the text of a PDF, trying OCR when direct extraction yields
    /// less than the configured minimum.
    pub fn process(&self, path: &Path) -> Result<PdfDocument> {
        info!("Processing PDF: {}", path.display());

        let file_size = path
            .metadata()
            .with_context(|| format!("Failed to read metadata: {}", path.display()))?
            .len();

        let text = match pdf::extract_text(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("{:#}", e);
                String::new()
            }
        };

        let mut document = PdfDocument {
            path: path.to_path_buf(),
            text,
            file_size,
            used_ocr: false,
        };

        if document.text.chars().count() >= self.min_text_length || !self.enable_ocr {
            return Ok(document);
        }

        if !is_ocr_available() {
            debug!("OCR tools not installed; keeping direct extraction for {}", path.display());
            return Ok(document);
        }

        info!(
            "Text extraction returned {} chars, attempting OCR for {}",
            document.text.chars().count(),
            path.display()
        );

        match ocr::extract_text(path) {
            Ok(ocr_text) if ocr_text.chars().count() > document.text.chars().count() => {
                info!("OCR produced {} chars", ocr_text.chars().count());
                document.text = ocr_text;
                document.used_ocr = true;
            }
            Ok(_) => debug!("OCR did not improve on direct extraction"),
            Err(e) => warn!("OCR failed for {}: {:#}", path.display(), e),
        }

        Ok(document)
    }
}

/// All PDFs under `input`, sorted. A single file is returned as-is when it
/// has a `.pdf` extension.
pub fn collect_pdfs(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(if has_pdf_extension(input) {
            vec![input.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    if !input.is_dir() {
        anyhow::bail!("Input path does not exist: {}", input.display());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| has_pdf_extension(p))
        .collect();
    files.sort();

    Ok(files)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
