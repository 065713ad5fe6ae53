//! Axum route handlers for sessions, profiling and matching.
//!
//! Handlers parse and clamp request parameters, then hand off to the pipeline while
//! holding the session lock. No profiling logic lives here.

use std::collections::HashMap;
use std::str::FromStr;

use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        Multipart, Path, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::builder::GenerationOverrides;
use super::pipeline::{ProfilingTask, TaskInput, TaskReport};
use super::session::{Session, SessionHandle};
use crate::errors::AppError;
use crate::extraction::{DocumentKind, RawDocument};
use crate::models::{MatchResult, Profile, ProfileKind};
use crate::state::AppState;

const MAX_TOKENS_LIMIT: u32 = 8192;

const RESUME_KINDS: &[DocumentKind] = &[
    DocumentKind::Pdf,
    DocumentKind::Docx,
    DocumentKind::FreeText,
];
const HEADER_KINDS: &[DocumentKind] = &[DocumentKind::Spreadsheet, DocumentKind::Image];

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub job: Option<Profile>,
    pub candidate: Option<Profile>,
    pub ready_to_match: bool,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        let store = session.store();
        Self {
            id: session.id,
            created_at: session.created_at,
            job: store.get(ProfileKind::Job).cloned(),
            candidate: store.get(ProfileKind::Candidate).cloned(),
            ready_to_match: store.has_both(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobRequest {
    pub description: String,
    #[serde(flatten)]
    pub overrides: GenerationOverrides,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub session_id: Uuid,
    pub result: MatchResult,
}

/// A parsed multipart form: at most one uploaded document plus text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub document: Option<RawDocument>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(String::from)
    }

    /// Rejects a document whose kind the endpoint does not accept.
    pub fn require_kind(&self, allowed: &[DocumentKind]) -> Result<(), AppError> {
        match &self.document {
            Some(doc) if !allowed.contains(&doc.kind) => Err(AppError::Validation(format!(
                "unsupported file type for this endpoint: {:?}",
                doc.kind
            ))),
            _ => Ok(()),
        }
    }

    pub fn overrides(&self) -> Result<GenerationOverrides, AppError> {
        Ok(GenerationOverrides {
            temperature: self.parse_field("temperature")?,
            top_p: self.parse_field("top_p")?,
            max_tokens: self.parse_field("max_tokens")?,
        })
    }

    fn parse_field<T: FromStr>(&self, name: &str) -> Result<Option<T>, AppError> {
        self.text(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|_| {
                    AppError::Validation(format!("{name} is not a valid number: {raw}"))
                })
            })
            .transpose()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Reads every multipart field. The `file` part becomes the document; empty file parts
/// (a form submitted without choosing a file) are ignored.
pub async fn read_upload(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read multipart field: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            let file_name = field.file_name().map(String::from);
            let content_type = field.content_type().map(String::from);
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
            if data.is_empty() {
                continue;
            }

            let kind = DocumentKind::from_upload(file_name.as_deref(), content_type.as_deref())
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "unrecognized file type: {}",
                        file_name.as_deref().unwrap_or("<unnamed>")
                    ))
                })?;
            debug!("Received {:?} upload ({} bytes)", kind, data.len());
            form.document = Some(
                RawDocument::new(kind, data)
                    .with_file_name(file_name)
                    .with_media_type(content_type),
            );
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read field {name}: {e}")))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

/// Brings caller-supplied parameters into the range the generation service accepts.
/// Non-finite floats are dropped so the task default applies.
pub fn clamp_overrides(overrides: GenerationOverrides) -> GenerationOverrides {
    let unit = |value: Option<f32>| value.filter(|v| v.is_finite()).map(|v| v.clamp(0.0, 1.0));
    GenerationOverrides {
        temperature: unit(overrides.temperature),
        top_p: unit(overrides.top_p),
        max_tokens: overrides.max_tokens.map(|t| t.clamp(1, MAX_TOKENS_LIMIT)),
    }
}

/// Parses the optional `/match` body. No body means task defaults; a body that is
/// present must be a valid parameter object.
pub fn match_overrides(body: &[u8]) -> Result<GenerationOverrides, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(GenerationOverrides::default());
    }
    serde_json::from_slice::<GenerationOverrides>(body)
        .map(clamp_overrides)
        .map_err(|e| AppError::Validation(format!("invalid match parameters: {e}")))
}

async fn session_handle(state: &AppState, id: Uuid) -> Result<SessionHandle, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

async fn run_profiling(
    state: &AppState,
    id: Uuid,
    task: ProfilingTask,
    input: TaskInput,
) -> Result<TaskReport, AppError> {
    let handle = session_handle(state, id).await?;
    let mut session = handle.lock().await;
    Ok(state.pipeline.run_profiling(&mut session, task, input).await?)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionResponse>) {
    let handle = state.sessions.create().await;
    let session = handle.lock().await;
    debug!(
        "Created session {} ({} live)",
        session.id,
        state.sessions.len().await
    );
    (StatusCode::CREATED, Json(SessionResponse::from(&*session)))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = session_handle(&state, id).await?;
    let session = handle.lock().await;
    Ok(Json(SessionResponse::from(&*session)))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session {id} not found")))
    }
}

/// POST /api/v1/sessions/:id/resume
///
/// Multipart: `file` (pdf, docx or txt), `text`, `target_position`, generation params.
/// On success the candidate profile of the session is replaced.
pub async fn handle_profile_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TaskReport>, AppError> {
    let form = read_upload(multipart?).await?;
    form.require_kind(RESUME_KINDS)?;

    let input = TaskInput {
        free_text: form.text("text"),
        target_position: form.text("target_position"),
        overrides: clamp_overrides(form.overrides()?),
        document: form.document,
    };

    let report = run_profiling(&state, id, ProfilingTask::Resume, input).await?;
    Ok(Json(report))
}

/// POST /api/v1/sessions/:id/job
pub async fn handle_profile_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Result<Json<JobRequest>, JsonRejection>,
) -> Result<Json<TaskReport>, AppError> {
    let Json(request) = request?;
    if request.description.trim().is_empty() {
        return Err(AppError::Validation("description cannot be empty".to_string()));
    }

    let input = TaskInput {
        free_text: Some(request.description),
        overrides: clamp_overrides(request.overrides),
        ..Default::default()
    };

    let report = run_profiling(&state, id, ProfilingTask::Job, input).await?;
    Ok(Json(report))
}

/// POST /api/v1/sessions/:id/headers
///
/// Multipart: `file` (spreadsheet or table image), `business_description`, generation params.
/// Returns analysis recommendations; the session's profiles are not touched.
pub async fn handle_profile_headers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TaskReport>, AppError> {
    let form = read_upload(multipart?).await?;
    form.require_kind(HEADER_KINDS)?;

    let input = TaskInput {
        free_text: form.text("business_description"),
        overrides: clamp_overrides(form.overrides()?),
        document: form.document,
        ..Default::default()
    };

    let report = run_profiling(&state, id, ProfilingTask::Headers, input).await?;
    Ok(Json(report))
}

/// POST /api/v1/sessions/:id/match
///
/// Body is optional: `{temperature?, top_p?, max_tokens?}`. A malformed body is a 400.
pub async fn handle_match(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<MatchResponse>, AppError> {
    let overrides = match_overrides(&body)?;

    let handle = session_handle(&state, id).await?;
    let session = handle.lock().await;
    let result = state.pipeline.run_match(&session, overrides).await?;

    Ok(Json(MatchResponse {
        session_id: id,
        result,
    }))
}
