// Profiling & matching: prompt building, per-session profile storage, the task
// pipeline and its HTTP handlers.
// All generation goes through llm_client::TextGenerator.

pub mod builder;
pub mod handlers;
pub mod matcher;
pub mod pipeline;
pub mod prompts;
pub mod session;
