use crate::config::Config;
use crate::profiling::pipeline::Pipeline;
use crate::profiling::session::SessionRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Runs profiling and matching tasks. Wraps the generation client.
    pub pipeline: Pipeline,
    /// Live sessions. Each holds at most one job and one candidate profile.
    pub sessions: SessionRegistry,
}
