//! Matching Engine: compares a job profile with a candidate profile.
//!
//! The reply is kept as opaque text. The 0-100% indication inside it is not parsed.

use tracing::debug;

use super::builder::{build, GenerationOverrides, PromptInputs, TaskKind};
use crate::errors::PipelineError;
use crate::llm_client::{GenerationRequest, TextGenerator};
use crate::models::{MatchResult, Profile};

pub struct MatchingEngine<'a> {
    generator: &'a dyn TextGenerator,
}

impl<'a> MatchingEngine<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self { generator }
    }

    /// Builds the `match` request. No remote call.
    pub fn prepare(
        job: &Profile,
        candidate: &Profile,
        overrides: GenerationOverrides,
    ) -> Result<GenerationRequest, PipelineError> {
        build(
            TaskKind::Match,
            &PromptInputs {
                job: Some(job),
                candidate: Some(candidate),
                overrides,
                ..Default::default()
            },
        )
    }

    /// Sends a prepared request. Exactly one remote call.
    pub async fn run(&self, request: &GenerationRequest) -> Result<MatchResult, PipelineError> {
        let content = self.generator.generate(request).await?;
        debug!("Match result received ({} chars)", content.len());
        Ok(MatchResult::new(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedGenerator;
    use crate::llm_client::GenerationError;
    use crate::models::ProfileKind;

    async fn score_match(generator: &ScriptedGenerator) -> Result<MatchResult, PipelineError> {
        let (job, candidate) = profiles();
        let request = MatchingEngine::prepare(&job, &candidate, GenerationOverrides::default())?;
        MatchingEngine::new(generator).run(&request).await
    }

    fn profiles() -> (Profile, Profile) {
        (
            Profile::new(ProfileKind::Job, "Required Skills: Go"),
            Profile::new(ProfileKind::Candidate, "Skills: Go, led 3 teams"),
        )
    }

    #[tokio::test]
    async fn test_match_returns_reply_verbatim() {
        let generator = ScriptedGenerator::replying("Match score: 85%\nStrong Go background.");
        let result = score_match(&generator).await.unwrap();
        assert_eq!(result.content, "Match score: 85%\nStrong Go background.");

        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].user_prompt.contains("Required Skills: Go"));
        assert!(requests[0].user_prompt.contains("Skills: Go, led 3 teams"));
        assert!(requests[0].system_prompt.contains("0 to 100%"));
    }

    #[tokio::test]
    async fn test_match_without_a_score_is_still_success() {
        let generator = ScriptedGenerator::replying("The candidate looks promising.");
        assert!(score_match(&generator).await.is_ok());
    }

    #[tokio::test]
    async fn test_match_surfaces_generation_error() {
        let generator = ScriptedGenerator::new([Err(GenerationError::Service {
            status: 429,
            message: "quota exceeded".to_string(),
        })]);
        let err = score_match(&generator).await.unwrap_err();
        assert_eq!(
            err,
            PipelineError::Generation(GenerationError::Service {
                status: 429,
                message: "quota exceeded".to_string(),
            })
        );
    }

    #[test]
    fn test_prepare_applies_overrides() {
        let (job, candidate) = profiles();
        let request = MatchingEngine::prepare(
            &job,
            &candidate,
            GenerationOverrides {
                max_tokens: Some(600),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(request.max_tokens, 600);
        assert_eq!(request.temperature, 0.3);
    }
}
