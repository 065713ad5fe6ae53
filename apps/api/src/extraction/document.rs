//! Full-text extraction for PDF, DOCX and plain-text uploads.
//!
//! A page or paragraph that yields nothing is skipped. Only a document that yields zero
//! characters overall is an error (`EmptyDocument`).

use tracing::{debug, warn};

use super::{ExtractedContent, ExtractionError};

/// PDF text. `pdf-extract` reads the whole document first; when it fails (or returns only
/// whitespace) `lopdf` is used page by page, skipping pages that fail to decode.
pub fn pdf_text(data: &[u8]) -> Result<ExtractedContent, ExtractionError> {
    let text = match pdf_extract::extract_text_from_mem(data) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            debug!("pdf-extract returned no text, retrying page by page");
            pdf_text_by_page(data)?
        }
        Err(e) => {
            warn!("pdf-extract failed: {e}, retrying page by page");
            pdf_text_by_page(data)?
        }
    };

    non_empty(normalize_lines(&text), "PDF has no text layer")
}

fn pdf_text_by_page(data: &[u8]) -> Result<String, ExtractionError> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| ExtractionError::EmptyDocument(format!("unreadable PDF: {e}")))?;

    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text),
            Err(e) => warn!("Skipping PDF page {page_number}: {e}"),
        }
    }
    Ok(pages.join("\n"))
}

/// DOCX paragraph text in document order, one line per non-empty paragraph.
pub fn docx_text(data: &[u8]) -> Result<ExtractedContent, ExtractionError> {
    let docx = docx_rs::read_docx(data)
        .map_err(|e| ExtractionError::EmptyDocument(format!("unreadable DOCX: {e}")))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            docx_rs::DocumentChild::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
            _ => None,
        })
        .filter(|text| !text.trim().is_empty())
        .collect();

    non_empty(paragraphs.join("\n"), "DOCX has no paragraph text")
}

fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let docx_rs::ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let docx_rs::RunChild::Text(t) = run_child {
                    text.push_str(&t.text);
                }
            }
        }
    }
    text
}

/// Pasted or `.txt` uploads. Invalid UTF-8 sequences are replaced, not rejected.
pub fn plain_text(data: &[u8]) -> Result<ExtractedContent, ExtractionError> {
    let text = String::from_utf8_lossy(data).replace('\0', "");
    non_empty(text, "text is blank")
}

/// Drops NUL characters, trims each line and removes blank lines.
fn normalize_lines(text: &str) -> String {
    text.replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_empty(text: String, reason: &str) -> Result<ExtractedContent, ExtractionError> {
    if text.trim().is_empty() {
        Err(ExtractionError::EmptyDocument(reason.to_string()))
    } else {
        Ok(ExtractedContent::Text(text))
    }
}
