//! PDF text extraction.
//!
//! PDF is the only accepted document type. Extraction happens page by page
//! so every chunk can be attributed to the page it came from.

use crate::error::{Error, Result};
use crate::models::Page;

/// The only file extension accepted for upload.
pub const PDF_EXTENSION: &str = "pdf";

/// Returns true if `filename` has a `.pdf` extension (ASCII case-insensitive).
pub fn is_supported_upload(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(PDF_EXTENSION))
        .unwrap_or(false)
}

/// Extract the text of every page. Page numbers start at 1.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<Page>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| Error::Document(format!("PDF extraction failed: {}", e)))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| Page {
            number: i as u32 + 1,
            text,
        })
        .collect())
}
