use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of a match a profile describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Job,
    Candidate,
}

impl ProfileKind {
    pub const ALL: [ProfileKind; 2] = [ProfileKind::Job, ProfileKind::Candidate];

    pub fn as_str(self) -> &'static str {
        match self {
            ProfileKind::Job => "job",
            ProfileKind::Candidate => "candidate",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated job or candidate profile.
///
/// `content` is the generation service's text, kept exactly as returned. It is display
/// text, not a parsed schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub kind: ProfileKind,
    pub content: String,
    pub generated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(kind: ProfileKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            generated_at: Utc::now(),
        }
    }
}

/// Compatibility assessment between a job profile and a candidate profile.
/// Carries a 0–100 indication plus rationale inside `content`; the score is not parsed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub content: String,
    pub generated_at: DateTime<Utc>,
}

impl MatchResult {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            generated_at: Utc::now(),
        }
    }
}

/// Analysis recommendations for a table, produced from its header labels and/or a
/// business description. Returned to the caller only; never stored in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderAnalysis {
    pub labels: Option<Vec<String>>,
    pub content: String,
    pub generated_at: DateTime<Utc>,
}

impl HeaderAnalysis {
    pub fn new(labels: Option<Vec<String>>, content: impl Into<String>) -> Self {
        Self {
            labels,
            content: content.into(),
            generated_at: Utc::now(),
        }
    }
}
