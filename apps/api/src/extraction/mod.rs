// Extraction Adapter: turns uploaded bytes into text or header labels for prompting.
// PDF, DOCX and spreadsheet parsing is CPU-bound and runs inside tokio::task::spawn_blocking.
// Images are read by the vision model through the same TextGenerator the pipeline uses.

pub mod document;
pub mod image;
pub mod prompts;
pub mod spreadsheet;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::llm_client::{GenerationError, TextGenerator};

/// Declared format of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Spreadsheet,
    Image,
    FreeText,
}

impl DocumentKind {
    /// Infers the kind from the upload's file name, then its MIME type.
    pub fn from_upload(file_name: Option<&str>, content_type: Option<&str>) -> Option<Self> {
        let by_extension = file_name
            .and_then(|name| name.rsplit_once('.'))
            .and_then(|(_, ext)| Self::from_extension(&ext.to_lowercase()));

        by_extension.or_else(|| content_type.and_then(Self::from_media_type))
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" | "csv" => Some(Self::Spreadsheet),
            "png" | "jpg" | "jpeg" | "webp" | "gif" | "bmp" => Some(Self::Image),
            "txt" | "md" => Some(Self::FreeText),
            _ => None,
        }
    }

    fn from_media_type(media_type: &str) -> Option<Self> {
        let media_type = media_type.split(';').next().unwrap_or("").trim();
        match media_type {
            "application/pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel"
            | "application/vnd.oasis.opendocument.spreadsheet"
            | "text/csv" => Some(Self::Spreadsheet),
            "text/plain" | "text/markdown" => Some(Self::FreeText),
            other if other.starts_with("image/") => Some(Self::Image),
            _ => None,
        }
    }
}

/// An uploaded document. Immutable once received; consumed once by `extract`.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub kind: DocumentKind,
    pub bytes: Bytes,
    pub file_name: Option<String>,
    pub media_type: Option<String>,
}

impl RawDocument {
    pub fn new(kind: DocumentKind, bytes: impl Into<Bytes>) -> Self {
        Self {
            kind,
            bytes: bytes.into(),
            file_name: None,
            media_type: None,
        }
    }

    pub fn with_file_name(mut self, file_name: Option<String>) -> Self {
        self.file_name = file_name;
        self
    }

    pub fn with_media_type(mut self, media_type: Option<String>) -> Self {
        self.media_type = media_type;
        self
    }
}

/// Normalized extraction output. Never empty when extraction succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ExtractedContent {
    /// Full document text, sections in document order.
    Text(String),
    /// Ordered column header labels.
    Labels(Vec<String>),
}

impl ExtractedContent {
    /// The form interpolated into prompts: text as-is, labels joined with ", ".
    pub fn prompt_text(&self) -> String {
        match self {
            ExtractedContent::Text(text) => text.clone(),
            ExtractedContent::Labels(labels) => labels.join(", "),
        }
    }

    pub fn labels(&self) -> Option<&[String]> {
        match self {
            ExtractedContent::Labels(labels) => Some(labels),
            ExtractedContent::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("document contains no extractable text: {0}")]
    EmptyDocument(String),

    #[error("malformed table: {0}")]
    MalformedTable(String),

    #[error("header recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("header recognition call failed: {0}")]
    Recognition(#[from] GenerationError),
}

/// Extracts content from a document. The `recognizer` is only called for images.
pub async fn extract(
    doc: &RawDocument,
    recognizer: &dyn TextGenerator,
) -> Result<ExtractedContent, ExtractionError> {
    let bytes = doc.bytes.clone();
    match doc.kind {
        DocumentKind::Pdf => {
            blocking(move || document::pdf_text(&bytes), ExtractionError::EmptyDocument).await
        }
        DocumentKind::Docx => {
            blocking(move || document::docx_text(&bytes), ExtractionError::EmptyDocument).await
        }
        DocumentKind::Spreadsheet => {
            blocking(
                move || spreadsheet::header_labels(&bytes),
                ExtractionError::MalformedTable,
            )
            .await
        }
        DocumentKind::Image => image::recognize_headers(doc, recognizer).await,
        DocumentKind::FreeText => document::plain_text(&bytes),
    }
}

/// Runs a parser on the blocking pool. A panicking parser is reported through `on_abort`.
async fn blocking<F>(
    parse: F,
    on_abort: fn(String) -> ExtractionError,
) -> Result<ExtractedContent, ExtractionError>
where
    F: FnOnce() -> Result<ExtractedContent, ExtractionError> + Send + 'static,
{
    tokio::task::spawn_blocking(parse)
        .await
        .unwrap_or_else(|e| Err(on_abort(format!("parser aborted: {e}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedGenerator;

    #[test]
    fn test_from_upload_prefers_extension() {
        assert_eq!(
            DocumentKind::from_upload(Some("resume.PDF"), Some("application/octet-stream")),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentKind::from_upload(Some("staff.xlsx"), None),
            Some(DocumentKind::Spreadsheet)
        );
        assert_eq!(
            DocumentKind::from_upload(Some("headers.csv"), None),
            Some(DocumentKind::Spreadsheet)
        );
    }

    #[test]
    fn test_from_upload_falls_back_to_media_type() {
        assert_eq!(
            DocumentKind::from_upload(Some("blob"), Some("image/jpeg")),
            Some(DocumentKind::Image)
        );
        assert_eq!(
            DocumentKind::from_upload(
                None,
                Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
            ),
            Some(DocumentKind::Docx)
        );
        assert_eq!(
            DocumentKind::from_upload(None, Some("text/plain; charset=utf-8")),
            Some(DocumentKind::FreeText)
        );
    }

    #[test]
    fn test_from_upload_unknown_is_none() {
        assert_eq!(
            DocumentKind::from_upload(Some("archive.zip"), Some("application/zip")),
            None
        );
        assert_eq!(DocumentKind::from_upload(None, None), None);
    }

    #[test]
    fn test_prompt_text_joins_labels() {
        let content = ExtractedContent::Labels(vec![
            "Name".to_string(),
            "Age".to_string(),
            "Salary".to_string(),
        ]);
        assert_eq!(content.prompt_text(), "Name, Age, Salary");
    }

    #[tokio::test]
    async fn test_extract_free_text() {
        let generator = ScriptedGenerator::unscripted();
        let doc = RawDocument::new(DocumentKind::FreeText, "5 years Go, led 3 teams");
        let content = extract(&doc, &generator).await.unwrap();
        assert_eq!(
            content,
            ExtractedContent::Text("5 years Go, led 3 teams".to_string())
        );
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_extract_whitespace_free_text_is_empty_document() {
        let generator = ScriptedGenerator::unscripted();
        let doc = RawDocument::new(DocumentKind::FreeText, " \n\t ");
        let err = extract(&doc, &generator).await.unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyDocument(_)));
    }

    #[tokio::test]
    async fn test_extract_spreadsheet_runs_on_blocking_pool() {
        let generator = ScriptedGenerator::unscripted();
        let doc = RawDocument::new(DocumentKind::Spreadsheet, "Name,Age,Salary\nAda,36,100\n");
        let content = extract(&doc, &generator).await.unwrap();
        assert_eq!(
            content.labels().unwrap(),
            ["Name".to_string(), "Age".to_string(), "Salary".to_string()]
        );
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_extract_garbage_pdf_is_empty_document() {
        let generator = ScriptedGenerator::unscripted();
        let doc = RawDocument::new(DocumentKind::Pdf, &b"definitely not a pdf"[..]);
        let err = extract(&doc, &generator).await.unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyDocument(_)));
    }

    #[tokio::test]
    async fn test_extract_image_calls_recognizer_once() {
        let generator = ScriptedGenerator::replying("Name, Age, Salary");
        let doc = RawDocument::new(DocumentKind::Image, &b"\x89PNG fake"[..]);
        let content = extract(&doc, &generator).await.unwrap();
        assert_eq!(content.prompt_text(), "Name, Age, Salary");
        assert_eq!(generator.call_count(), 1);
    }
}
