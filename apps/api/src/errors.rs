use std::fmt;

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::extraction::ExtractionError;
use crate::llm_client::GenerationError;
use crate::models::ProfileKind;
use crate::profiling::builder::TaskKind;

/// Why a pipeline task could not complete.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// Caller precondition violated. Detected before any remote call.
    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// A match was requested before both profiles exist in the session.
    #[error("incomplete profiles: no {} profile in this session", describe_kinds(.missing))]
    IncompleteProfiles { missing: Vec<ProfileKind> },
}

fn describe_kinds(kinds: &[ProfileKind]) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(" or ")
}

/// States a task moves through:
/// `Idle -> InputValidated -> Extracting? -> PromptBuilt -> Generating -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    InputValidated,
    Extracting,
    PromptBuilt,
    Generating,
    Completed,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::InputValidated => "input_validated",
            PipelineStage::Extracting => "extracting",
            PipelineStage::PromptBuilt => "prompt_built",
            PipelineStage::Generating => "generating",
            PipelineStage::Completed => "completed",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A task that ended in `Failed`. `stage` is the last stage the task reached;
/// `error` is the originating error, unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{task} task failed at {stage}: {error}")]
pub struct PipelineFailure {
    pub task: TaskKind,
    pub stage: PipelineStage,
    #[source]
    pub error: PipelineError,
}

impl PipelineFailure {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.error {
            PipelineError::MissingInput(_) => (StatusCode::BAD_REQUEST, "MISSING_INPUT"),
            PipelineError::IncompleteProfiles { .. } => {
                (StatusCode::CONFLICT, "INCOMPLETE_PROFILES")
            }
            PipelineError::Extraction(ExtractionError::Recognition(e))
            | PipelineError::Generation(e) => generation_status_and_code(e),
            PipelineError::Extraction(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "EXTRACTION_ERROR")
            }
        }
    }
}

fn generation_status_and_code(error: &GenerationError) -> (StatusCode, &'static str) {
    match error {
        GenerationError::Transport(_) => (StatusCode::GATEWAY_TIMEOUT, "TRANSPORT_ERROR"),
        GenerationError::Service { .. } => (StatusCode::BAD_GATEWAY, "SERVICE_ERROR"),
        GenerationError::EmptyResponse => (StatusCode::BAD_GATEWAY, "EMPTY_RESPONSE"),
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineFailure),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Pipeline(failure) => failure.status_and_code(),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = match &self {
            AppError::Pipeline(failure) => {
                if status.is_server_error() {
                    tracing::error!("Pipeline failure: {failure}");
                }
                json!({
                    "error": {
                        "code": code,
                        "message": failure.to_string(),
                        "task": failure.task,
                        "stage": failure.stage,
                    }
                })
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                json!({
                    "error": {
                        "code": code,
                        "message": "An internal server error occurred",
                    }
                })
            }
            other => json!({
                "error": {
                    "code": code,
                    "message": other.to_string(),
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(stage: PipelineStage, error: PipelineError) -> AppError {
        AppError::Pipeline(PipelineFailure {
            task: TaskKind::ProfileResume,
            stage,
            error,
        })
    }

    #[test]
    fn test_incomplete_profiles_message_names_missing_kinds() {
        let err = PipelineError::IncompleteProfiles {
            missing: vec![ProfileKind::Job, ProfileKind::Candidate],
        };
        assert_eq!(
            err.to_string(),
            "incomplete profiles: no job or candidate profile in this session"
        );
    }

    #[test]
    fn test_failure_message_keeps_underlying_error_verbatim() {
        let failure = PipelineFailure {
            task: TaskKind::ProfileJob,
            stage: PipelineStage::Generating,
            error: PipelineError::Generation(GenerationError::Service {
                status: 400,
                message: "Invalid API parameter".to_string(),
            }),
        };
        assert_eq!(
            failure.to_string(),
            "profile_job task failed at generating: generation failed: \
             service error (status 400): Invalid API parameter"
        );
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                failure(PipelineStage::Idle, PipelineError::MissingInput("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                failure(
                    PipelineStage::Idle,
                    PipelineError::IncompleteProfiles {
                        missing: vec![ProfileKind::Job],
                    },
                ),
                StatusCode::CONFLICT,
            ),
            (
                failure(
                    PipelineStage::Extracting,
                    PipelineError::Extraction(ExtractionError::EmptyDocument("x".into())),
                ),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                failure(
                    PipelineStage::Extracting,
                    PipelineError::Extraction(ExtractionError::Recognition(
                        GenerationError::Transport("timeout".into()),
                    )),
                ),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                failure(
                    PipelineStage::Generating,
                    PipelineError::Generation(GenerationError::EmptyResponse),
                ),
                StatusCode::BAD_GATEWAY,
            ),
            (AppError::NotFound("session".into()), StatusCode::NOT_FOUND),
            (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
