//! Prompt Builder: deterministic system/user prompt pairs per task kind.
//!
//! Every task carries a fixed system prompt, model id and default parameters.
//! Preconditions are checked here so a bad request never reaches the generation service.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::prompts::{
    render, DATA_ANALYST_SYSTEM, DESCRIPTION_ONLY_TEMPLATE, HEADERS_AND_DESCRIPTION_TEMPLATE,
    HEADERS_ONLY_TEMPLATE, JOB_ANALYST_SYSTEM, JOB_TEMPLATE, MATCH_SYSTEM, MATCH_TEMPLATE,
    RESUME_ANALYST_SYSTEM, RESUME_TEMPLATE, UNSPECIFIED_POSITION,
};
use crate::errors::PipelineError;
use crate::extraction::ExtractedContent;
use crate::llm_client::prompts::{FIDELITY_INSTRUCTION, MARKDOWN_OUTPUT};
use crate::llm_client::{GenerationRequest, TEXT_MODEL};
use crate::models::{Profile, ProfileKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ProfileHeaders,
    ProfileResume,
    ProfileJob,
    Match,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::ProfileHeaders => "profile_headers",
            TaskKind::ProfileResume => "profile_resume",
            TaskKind::ProfileJob => "profile_job",
            TaskKind::Match => "match",
        }
    }

    pub fn system_prompt(&self) -> String {
        match self {
            TaskKind::ProfileHeaders => format!("{DATA_ANALYST_SYSTEM}\n\n{MARKDOWN_OUTPUT}"),
            TaskKind::ProfileResume => {
                format!("{RESUME_ANALYST_SYSTEM}\n\n{FIDELITY_INSTRUCTION}\n{MARKDOWN_OUTPUT}")
            }
            TaskKind::ProfileJob => {
                format!("{JOB_ANALYST_SYSTEM}\n\n{FIDELITY_INSTRUCTION}\n{MARKDOWN_OUTPUT}")
            }
            TaskKind::Match => format!("{MATCH_SYSTEM}\n\n{MARKDOWN_OUTPUT}"),
        }
    }

    /// All text tasks currently share one model.
    pub fn model_id(&self) -> &'static str {
        TEXT_MODEL
    }

    pub fn default_params(&self) -> GenerationParams {
        let (temperature, max_tokens) = match self {
            TaskKind::ProfileHeaders => (0.7, 2000),
            TaskKind::ProfileResume => (0.3, 2000),
            TaskKind::ProfileJob => (0.3, 2500),
            TaskKind::Match => (0.3, 1500),
        };
        GenerationParams {
            temperature,
            top_p: 0.8,
            max_tokens,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

/// Per-call parameter overrides. Values replace the task defaults as given;
/// range checks belong to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct GenerationOverrides {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationOverrides {
    pub fn apply(&self, defaults: GenerationParams) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
        }
    }
}

/// Everything a task may interpolate. Fields a task does not use are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptInputs<'a> {
    pub content: Option<&'a ExtractedContent>,
    pub free_text: Option<&'a str>,
    pub target_position: Option<&'a str>,
    pub job: Option<&'a Profile>,
    pub candidate: Option<&'a Profile>,
    pub overrides: GenerationOverrides,
}

/// Builds the request for `task`. Fails with `MissingInput` when the task's inputs are absent.
pub fn build(task: TaskKind, inputs: &PromptInputs<'_>) -> Result<GenerationRequest, PipelineError> {
    let content = inputs
        .content
        .map(ExtractedContent::prompt_text)
        .filter(|text| !text.trim().is_empty());
    let free_text = non_blank(inputs.free_text);

    let user_prompt = match task {
        TaskKind::ProfileHeaders => match (content.as_deref(), free_text) {
            (Some(headers), Some(description)) => render(
                HEADERS_AND_DESCRIPTION_TEMPLATE,
                &[("headers", headers), ("description", description)],
            ),
            (Some(headers), None) => render(HEADERS_ONLY_TEMPLATE, &[("headers", headers)]),
            (None, Some(description)) => {
                render(DESCRIPTION_ONLY_TEMPLATE, &[("description", description)])
            }
            (None, None) => return Err(missing_document(task)),
        },
        TaskKind::ProfileResume => {
            let resume_text =
                join_sources(content.as_deref(), free_text).ok_or_else(|| missing_document(task))?;
            let position = non_blank(inputs.target_position).unwrap_or(UNSPECIFIED_POSITION);
            render(
                RESUME_TEMPLATE,
                &[("position", position), ("resume_text", resume_text.as_str())],
            )
        }
        TaskKind::ProfileJob => {
            let description =
                join_sources(content.as_deref(), free_text).ok_or_else(|| missing_document(task))?;
            render(JOB_TEMPLATE, &[("description", description.as_str())])
        }
        TaskKind::Match => {
            let job = profile_of(inputs.job, ProfileKind::Job)?;
            let candidate = profile_of(inputs.candidate, ProfileKind::Candidate)?;
            render(
                MATCH_TEMPLATE,
                &[
                    ("job_profile", job.content.as_str()),
                    ("candidate_profile", candidate.content.as_str()),
                ],
            )
        }
    };

    let params = inputs.overrides.apply(task.default_params());

    Ok(GenerationRequest {
        model_id: task.model_id(),
        system_prompt: task.system_prompt(),
        user_prompt,
        temperature: params.temperature,
        top_p: params.top_p,
        max_tokens: params.max_tokens,
        image: None,
    })
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

/// Extracted text first, then pasted text. Either may be absent, not both.
fn join_sources(content: Option<&str>, free_text: Option<&str>) -> Option<String> {
    match (content, free_text) {
        (Some(a), Some(b)) => Some(format!("{a}\n\n{b}")),
        (Some(a), None) | (None, Some(a)) => Some(a.to_string()),
        (None, None) => None,
    }
}

fn missing_document(task: TaskKind) -> PipelineError {
    PipelineError::MissingInput(format!(
        "{task} needs an uploaded document or non-empty text"
    ))
}

fn profile_of(profile: Option<&Profile>, kind: ProfileKind) -> Result<&Profile, PipelineError> {
    profile
        .filter(|p| p.kind == kind && !p.content.trim().is_empty())
        .ok_or_else(|| PipelineError::MissingInput(format!("match needs a {kind} profile")))
}
