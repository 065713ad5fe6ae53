//! Pipeline Orchestrator.
//!
//! Each task walks `Idle -> InputValidated -> Extracting? -> PromptBuilt -> Generating`
//! and ends `Completed` or `Failed`. A task makes at most one generation call
//! (two for an image upload: recognition, then profiling) and never retries.
//! A failed task leaves the session store exactly as it found it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::builder::{build, GenerationOverrides, PromptInputs, TaskKind};
use super::matcher::MatchingEngine;
use super::session::Session;
use crate::errors::{PipelineError, PipelineFailure, PipelineStage};
use crate::extraction::{extract, ExtractedContent, RawDocument};
use crate::llm_client::TextGenerator;
use crate::models::{HeaderAnalysis, MatchResult, Profile, ProfileKind};

/// The profiling tasks. Matching has its own entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingTask {
    Headers,
    Resume,
    Job,
}

impl ProfilingTask {
    pub fn kind(self) -> TaskKind {
        match self {
            ProfilingTask::Headers => TaskKind::ProfileHeaders,
            ProfilingTask::Resume => TaskKind::ProfileResume,
            ProfilingTask::Job => TaskKind::ProfileJob,
        }
    }

    /// The store slot this task writes, if any.
    pub fn profile_kind(self) -> Option<ProfileKind> {
        match self {
            ProfilingTask::Headers => None,
            ProfilingTask::Resume => Some(ProfileKind::Candidate),
            ProfilingTask::Job => Some(ProfileKind::Job),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskInput {
    pub document: Option<RawDocument>,
    pub free_text: Option<String>,
    pub target_position: Option<String>,
    pub overrides: GenerationOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskOutput {
    Profile(Profile),
    HeaderAnalysis(HeaderAnalysis),
}

/// What a completed profiling task hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task: TaskKind,
    /// The extraction result, when a document was supplied.
    pub extracted: Option<ExtractedContent>,
    pub output: TaskOutput,
}

struct StageTracker {
    task: TaskKind,
    session_id: Uuid,
    stage: PipelineStage,
}

impl StageTracker {
    fn start(task: TaskKind, session_id: Uuid) -> Self {
        info!("Task {task} started for session {session_id}");
        Self {
            task,
            session_id,
            stage: PipelineStage::Idle,
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        debug!(
            "Task {} (session {}): {} -> {}",
            self.task, self.session_id, self.stage, next
        );
        self.stage = next;
    }

    fn complete(&mut self) {
        self.advance(PipelineStage::Completed);
        info!("Task {} completed for session {}", self.task, self.session_id);
    }

    /// Tags `error` with the stage reached so far.
    fn fail(&self, error: impl Into<PipelineError>) -> PipelineFailure {
        let error = error.into();
        debug!(
            "Task {} (session {}): {} -> {}",
            self.task,
            self.session_id,
            self.stage,
            PipelineStage::Failed
        );
        warn!(
            "Task {} failed at {} for session {}: {}",
            self.task, self.stage, self.session_id, error
        );
        PipelineFailure {
            task: self.task,
            stage: self.stage,
            error,
        }
    }
}

/// Runs tasks against a session. Cheap to clone; shares one generator.
#[derive(Clone)]
pub struct Pipeline {
    generator: Arc<dyn TextGenerator>,
}

impl Pipeline {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Extraction (when a document is supplied), prompt building and one generation call.
    /// Resume and job results replace the session's profile of that kind.
    pub async fn run_profiling(
        &self,
        session: &mut Session,
        task: ProfilingTask,
        input: TaskInput,
    ) -> Result<TaskReport, PipelineFailure> {
        let kind = task.kind();
        let mut tracker = StageTracker::start(kind, session.id);

        let free_text = input
            .free_text
            .as_deref()
            .filter(|text| !text.trim().is_empty());
        if input.document.is_none() && free_text.is_none() {
            return Err(tracker.fail(PipelineError::MissingInput(format!(
                "{kind} needs an uploaded document or non-empty text"
            ))));
        }
        tracker.advance(PipelineStage::InputValidated);

        let extracted = match &input.document {
            Some(document) => {
                tracker.advance(PipelineStage::Extracting);
                let content = extract(document, self.generator.as_ref())
                    .await
                    .map_err(|e| tracker.fail(e))?;
                Some(content)
            }
            None => None,
        };

        let request = build(
            kind,
            &PromptInputs {
                content: extracted.as_ref(),
                free_text,
                target_position: input.target_position.as_deref(),
                overrides: input.overrides,
                ..Default::default()
            },
        )
        .map_err(|e| tracker.fail(e))?;
        tracker.advance(PipelineStage::PromptBuilt);

        tracker.advance(PipelineStage::Generating);
        let text = self
            .generator
            .generate(&request)
            .await
            .map_err(|e| tracker.fail(e))?;

        let output = match task.profile_kind() {
            Some(profile_kind) => {
                let profile = Profile::new(profile_kind, text);
                session.store_mut().put(profile.clone());
                TaskOutput::Profile(profile)
            }
            None => {
                let labels = extracted
                    .as_ref()
                    .and_then(ExtractedContent::labels)
                    .map(<[String]>::to_vec);
                TaskOutput::HeaderAnalysis(HeaderAnalysis::new(labels, text))
            }
        };
        tracker.complete();

        Ok(TaskReport {
            task: kind,
            extracted,
            output,
        })
    }

    /// Scores the session's job profile against its candidate profile.
    /// Refused with `IncompleteProfiles` before any remote call unless both exist.
    pub async fn run_match(
        &self,
        session: &Session,
        overrides: GenerationOverrides,
    ) -> Result<MatchResult, PipelineFailure> {
        let mut tracker = StageTracker::start(TaskKind::Match, session.id);
        let store = session.store();

        let (Some(job), Some(candidate)) =
            (store.get(ProfileKind::Job), store.get(ProfileKind::Candidate))
        else {
            return Err(tracker.fail(PipelineError::IncompleteProfiles {
                missing: store.missing(),
            }));
        };
        tracker.advance(PipelineStage::InputValidated);

        let request =
            MatchingEngine::prepare(job, candidate, overrides).map_err(|e| tracker.fail(e))?;
        tracker.advance(PipelineStage::PromptBuilt);

        tracker.advance(PipelineStage::Generating);
        let result = MatchingEngine::new(self.generator.as_ref())
            .run(&request)
            .await
            .map_err(|e| tracker.fail(e))?;
        tracker.complete();

        Ok(result)
    }
}
