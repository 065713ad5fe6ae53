// Shared prompt fragments.
// Each module that calls the generation service defines its own prompts.rs alongside it.
// This file contains the cross-cutting pieces they append to their system prompts.

/// Appended to every profiling system prompt. Profiles are shown to a recruiter verbatim.
pub const FIDELITY_INSTRUCTION: &str = "\
    Use only information that is present in the input. \
    Do NOT infer, embellish, or invent skills, employers, dates, or qualifications. \
    If a field cannot be determined from the input, write \"not stated\".";

/// Appended to every system prompt whose output is rendered as-is.
pub const MARKDOWN_OUTPUT: &str = "\
    Format the answer as Markdown: a short heading per section and bullet lists for items. \
    Do NOT wrap the answer in code fences.";
