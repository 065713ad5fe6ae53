//! Header recognition for table screenshots via the vision model.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::{debug, warn};

use super::prompts::{HEADER_RECOGNITION_PROMPT, HEADER_RECOGNITION_SYSTEM};
use super::{ExtractedContent, ExtractionError, RawDocument};
use crate::llm_client::{
    strip_code_fences, GenerationError, GenerationRequest, ImageAttachment, TextGenerator,
    VISION_MODEL,
};

const RECOGNITION_TEMPERATURE: f32 = 0.1;
const RECOGNITION_TOP_P: f32 = 0.7;
const RECOGNITION_MAX_TOKENS: u32 = 512;
const DEFAULT_MEDIA_TYPE: &str = "image/png";

/// Sends the image to the vision model and splits its comma-separated reply into labels.
///
/// An empty reply, a `NONE` reply, or a reply with no labels is `RecognitionFailed`.
/// Transport and service failures are passed through unchanged as `Recognition`.
pub async fn recognize_headers(
    doc: &RawDocument,
    recognizer: &dyn TextGenerator,
) -> Result<ExtractedContent, ExtractionError> {
    if doc.bytes.is_empty() {
        return Err(ExtractionError::RecognitionFailed(
            "image upload is empty".to_string(),
        ));
    }

    let request = recognition_request(doc);
    debug!(
        "Requesting header recognition for {} byte {} image",
        doc.bytes.len(),
        request
            .image
            .as_ref()
            .map(|i| i.media_type.as_str())
            .unwrap_or(DEFAULT_MEDIA_TYPE)
    );

    let reply = match recognizer.generate(&request).await {
        Ok(reply) => reply,
        Err(GenerationError::EmptyResponse) => {
            return Err(ExtractionError::RecognitionFailed(
                "vision model returned no content".to_string(),
            ))
        }
        Err(e) => return Err(ExtractionError::Recognition(e)),
    };

    let labels = parse_labels(&reply);
    if labels.is_empty() {
        warn!("Vision reply contained no header labels: {reply:?}");
        return Err(ExtractionError::RecognitionFailed(format!(
            "no header labels in reply: {}",
            reply.trim()
        )));
    }

    Ok(ExtractedContent::Labels(labels))
}

fn recognition_request(doc: &RawDocument) -> GenerationRequest {
    GenerationRequest {
        model_id: VISION_MODEL,
        system_prompt: HEADER_RECOGNITION_SYSTEM.to_string(),
        user_prompt: HEADER_RECOGNITION_PROMPT.to_string(),
        temperature: RECOGNITION_TEMPERATURE,
        top_p: RECOGNITION_TOP_P,
        max_tokens: RECOGNITION_MAX_TOKENS,
        image: Some(ImageAttachment {
            media_type: image_media_type(doc),
            base64_data: BASE64.encode(&doc.bytes),
        }),
    }
}

fn image_media_type(doc: &RawDocument) -> String {
    if let Some(media_type) = doc.media_type.as_deref() {
        if media_type.starts_with("image/") {
            return media_type.to_string();
        }
    }

    let extension = doc
        .file_name
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => DEFAULT_MEDIA_TYPE,
    }
    .to_string()
}

/// Splits a recognition reply on ASCII and CJK separators and newlines.
/// Surrounding quotes and brackets are stripped; `NONE` means no table.
pub fn parse_labels(reply: &str) -> Vec<String> {
    let reply = strip_code_fences(reply);
    if reply.eq_ignore_ascii_case("none") {
        return Vec::new();
    }

    reply
        .split(|c: char| matches!(c, ',' | '，' | '、' | ';' | '；' | '\n'))
        .map(|label| {
            label
                .trim()
                .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '[' | ']' | '“' | '”'))
                .trim()
        })
        .filter(|label| !label.is_empty())
        .map(String::from)
        .collect()
}
