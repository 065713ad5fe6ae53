pub mod profile;

pub use profile::{HeaderAnalysis, MatchResult, Profile, ProfileKind};
