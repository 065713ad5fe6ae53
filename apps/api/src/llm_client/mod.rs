//! LLM Client: the single point of entry for all Text Generation Service calls in Talentscope.
//!
//! ARCHITECTURAL RULE: No other module may call the chat-completions API directly.
//! All generation goes through a `TextGenerator`; `LlmClient` is the production implementation.
//!
//! One `GenerationRequest` maps to exactly one remote call. There is no retry loop here:
//! a failed call is classified and handed back to the pipeline, which surfaces it as-is.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

/// Text model used by every profiling and matching task.
/// Hardcoded per task kind to prevent drift between prompt variants.
pub const TEXT_MODEL: &str = "glm-4-flash";
/// Vision model used to read table headers out of screenshots.
pub const VISION_MODEL: &str = "glm-4v-flash";

/// Why a generation call did not produce text.
/// All variants are recoverable: they are reported to the caller, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service error (status {status}): {message}")]
    Service { status: u16, message: String },

    #[error("generation service returned empty content")]
    EmptyResponse,
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Transport(format!("request timed out: {e}"))
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}

pub type GenerationResult = Result<String, GenerationError>;

/// Base64 image payload carried alongside the user instruction on the vision path.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    pub media_type: String,
    pub base64_data: String,
}

impl ImageAttachment {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64_data)
    }
}

/// A fully-specified generation call. Built fresh per call by the prompt builder
/// (or the image recognizer) and passed to the client by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model_id: &'static str,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub image: Option<ImageAttachment>,
}

/// The generation seam. The pipeline holds an `Arc<dyn TextGenerator>` so tests can
/// script replies without a network.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire format (OpenAI-compatible chat completions)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorEnvelope {
    error: ServiceErrorBody,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    message: String,
}

fn chat_body(request: &GenerationRequest) -> ChatRequest<'_> {
    let user_content = match &request.image {
        None => MessageContent::Text(&request.user_prompt),
        Some(image) => MessageContent::Parts(vec![
            ContentPart::Text {
                text: &request.user_prompt,
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image.data_url(),
                },
            },
        ]),
    };

    ChatRequest {
        model: request.model_id,
        messages: vec![
            ChatMessage {
                role: "system",
                content: MessageContent::Text(&request.system_prompt),
            },
            ChatMessage {
                role: "user",
                content: user_content,
            },
        ],
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens: request.max_tokens,
    }
}

/// Pulls the remote error message out of an error body, falling back to the raw body.
fn service_error_message(body: String) -> String {
    serde_json::from_str::<ServiceErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

/// Interprets a 2xx response body.
fn completion_text(status: u16, body: &str) -> GenerationResult {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Service {
            status,
            message: format!("malformed completion body: {e}"),
        })?;

    if let Some(usage) = &response.usage {
        debug!(
            "Generation succeeded: prompt_tokens={}, completion_tokens={}",
            usage.prompt_tokens, usage.completion_tokens
        );
    }

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or(GenerationError::EmptyResponse)
}

/// Strips ```lang ... ``` or ``` ... ``` code fences that models like to wrap short answers in.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(stripped) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence line. A line that holds
    // separators or whitespace is content, e.g. "```Name,Age\n```".
    let body = match stripped.find('\n') {
        Some(newline) if is_fence_tag(&stripped[..newline]) => &stripped[newline + 1..],
        _ => stripped,
    };
    body.trim_end()
        .strip_suffix("```")
        .map(|s| s.trim())
        .unwrap_or(body.trim())
}

fn is_fence_tag(line: &str) -> bool {
    const SEPARATORS: &[char] = &[',', '，', '、', ';', '；'];
    !line
        .trim_end()
        .chars()
        .any(|c| c.is_whitespace() || SEPARATORS.contains(&c))
}

// ────────────────────────────────────────────────────────────────────────────
// Production client
// ────────────────────────────────────────────────────────────────────────────

/// The chat-completions client used by the pipeline.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl LlmClient {
    /// `timeout` is the only client-side bound on a remote call.
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&chat_body(request))
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = service_error_message(body);
            warn!("Generation service returned {}: {}", status, message);
            return Err(GenerationError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        completion_text(status.as_u16(), &body)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Test support
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{GenerationRequest, GenerationResult, TextGenerator};

    /// Replays scripted results in order and records every request it receives.
    /// Once the script runs out it answers with a fixed reply.
    pub struct ScriptedGenerator {
        replies: Mutex<VecDeque<GenerationResult>>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedGenerator {
        pub fn new(replies: impl IntoIterator<Item = GenerationResult>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Answers every call with the fixed fallback reply.
        pub fn unscripted() -> Self {
            Self::new(Vec::<GenerationResult>::new())
        }

        pub fn replying(text: &str) -> Self {
            Self::new([Ok(text.to_string())])
        }

        pub fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("scripted reply".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(image: Option<ImageAttachment>) -> GenerationRequest {
        GenerationRequest {
            model_id: TEXT_MODEL,
            system_prompt: "You are a resume analyst.".to_string(),
            user_prompt: "Profile this resume".to_string(),
            temperature: 0.3,
            top_p: 0.8,
            max_tokens: 2000,
            image,
        }
    }

    #[test]
    fn test_chat_body_text_only() {
        let value = serde_json::to_value(chat_body(&request(None))).unwrap();
        assert_eq!(value["model"], "glm-4-flash");
        assert_eq!(value["max_tokens"], 2000);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][0]["content"], "You are a resume analyst.");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "Profile this resume");
    }

    #[test]
    fn test_chat_body_with_image_uses_content_parts() {
        let image = ImageAttachment {
            media_type: "image/png".to_string(),
            base64_data: "aGVsbG8=".to_string(),
        };
        let value = serde_json::to_value(chat_body(&request(Some(image)))).unwrap();
        assert_eq!(
            value["messages"][1]["content"],
            json!([
                {"type": "text", "text": "Profile this resume"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,aGVsbG8="}}
            ])
        );
    }

    #[test]
    fn test_completion_text_returns_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Skills: Go"}}],
                      "usage":{"prompt_tokens":10,"completion_tokens":3}}"#;
        assert_eq!(completion_text(200, body).unwrap(), "Skills: Go");
    }

    #[test]
    fn test_completion_text_no_choices_is_empty_response() {
        let body = r#"{"choices":[]}"#;
        assert_eq!(completion_text(200, body), Err(GenerationError::EmptyResponse));
    }

    #[test]
    fn test_completion_text_blank_content_is_empty_response() {
        let body = r#"{"choices":[{"message":{"content":"   \n"}}]}"#;
        assert_eq!(completion_text(200, body), Err(GenerationError::EmptyResponse));
    }

    #[test]
    fn test_completion_text_malformed_body_is_service_error() {
        let err = completion_text(200, "<html>gateway</html>").unwrap_err();
        assert!(matches!(err, GenerationError::Service { status: 200, .. }));
    }

    #[test]
    fn test_service_error_message_extracts_remote_message() {
        let body = r#"{"error":{"code":"1210","message":"Invalid API parameter"}}"#.to_string();
        assert_eq!(service_error_message(body), "Invalid API parameter");
    }

    #[test]
    fn test_service_error_message_falls_back_to_raw_body() {
        assert_eq!(service_error_message("quota exceeded".to_string()), "quota exceeded");
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = LlmClient::new(
            "key".to_string(),
            "https://open.bigmodel.cn/api/paas/v4/",
            Duration::from_secs(5),
        );
        assert_eq!(
            client.endpoint(),
            "https://open.bigmodel.cn/api/paas/v4/chat/completions"
        );
    }

    #[test]
    fn test_strip_code_fences_with_language_tag() {
        let input = "```text\nName, Age\n```";
        assert_eq!(strip_code_fences(input), "Name, Age");
    }

    #[test]
    fn test_strip_code_fences_without_tag() {
        let input = "```\nName, Age\n```";
        assert_eq!(strip_code_fences(input), "Name, Age");
    }

    #[test]
    fn test_strip_code_fences_keeps_content_on_fence_line() {
        assert_eq!(strip_code_fences("```Name,Age,Salary\n```"), "Name,Age,Salary");
        assert_eq!(strip_code_fences("```Name Age\n```"), "Name Age");
        assert_eq!(strip_code_fences("```csv\r\nName;Age\r\n```"), "Name;Age");
    }

    #[test]
    fn test_strip_code_fences_no_fences() {
        assert_eq!(strip_code_fences("  Name, Age "), "Name, Age");
    }
}
