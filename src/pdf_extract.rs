// src/pdf_extract.rs

use lopdf::{Dictionary, Document, Object};
use thiserror::Error;
use tracing::{debug, info};

/// Fewer non-whitespace characters than this means no usable text layer.
const MIN_TEXT_CHARS: usize = 30;

/// Share of image-only pages above which the whole PDF counts as scanned.
const SCANNED_RATIO: f64 = 0.8;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("not a readable PDF: {0}")]
    Parse(#[from] lopdf::Error),

    #[error("scanned document ({image_pages}/{pages} image-only pages)")]
    Scanned { image_pages: usize, pages: usize },

    #[error("text layer too short ({0} characters)")]
    NoText(usize),

    #[error("text extraction failed: {0}")]
    Extract(String),
}

/// Text layer of a purchase-order PDF.
///
/// Image-only documents are refused before the (slow) text pass, there is
/// no OCR fallback.
pub fn extract_text_from_pdf(pdf_bytes: &[u8]) -> Result<String, PdfError> {
    let doc = Document::load_mem(pdf_bytes)?;

    let pages = doc.get_pages();
    let image_pages = pages
        .values()
        .filter(|id| is_image_only(&doc, **id))
        .count();
    debug!(pages = pages.len(), image_pages, "Page scan");
    if !pages.is_empty() && image_pages as f64 / pages.len() as f64 >= SCANNED_RATIO {
        return Err(PdfError::Scanned {
            image_pages,
            pages: pages.len(),
        });
    }

    let text = pdf_extract::extract_text_from_mem(pdf_bytes)
        .map_err(|e| PdfError::Extract(e.to_string()))?;
    let chars = text.chars().filter(|c| !c.is_whitespace()).count();
    if chars < MIN_TEXT_CHARS {
        return Err(PdfError::NoText(chars));
    }

    info!(chars, pages = pages.len(), "PDF text extracted");
    Ok(text)
}

/// Follow a reference (if any) to a dictionary.
fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    doc.dereference(obj)
        .ok()
        .and_then(|(_, resolved)| resolved.as_dict().ok())
}

/// Images in the page resources but no fonts: a scanned page.
fn is_image_only(doc: &Document, page_id: lopdf::ObjectId) -> bool {
    let resources = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .ok()
        .and_then(|page| page.get(b"Resources").ok())
        .and_then(|r| resolve_dict(doc, r));
    let Some(resources) = resources else {
        return false;
    };
    let non_empty = |key: &[u8]| {
        resources
            .get(key)
            .ok()
            .and_then(|v| resolve_dict(doc, v))
            .is_some_and(|d| !d.is_empty())
    };
    non_empty(b"XObject") && !non_empty(b"Font")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes() {
        let result = extract_text_from_pdf(b"this is not a pdf");
        assert!(matches!(result, Err(PdfError::Parse(_))));
    }

    #[test]
    fn test_empty_bytes() {
        assert!(matches!(extract_text_from_pdf(b""), Err(PdfError::Parse(_))));
    }

    #[test]
    fn test_error_messages() {
        let e = PdfError::Scanned {
            image_pages: 3,
            pages: 3,
        };
        assert_eq!(e.to_string(), "scanned document (3/3 image-only pages)");
        assert_eq!(
            PdfError::NoText(4).to_string(),
            "text layer too short (4 characters)"
        );
    }
}
