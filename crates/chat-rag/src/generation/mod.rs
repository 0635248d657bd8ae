//! Context assembly, prompt templates and citation handling

pub mod citation;
pub mod context;
pub mod prompt;

pub use citation::{extract_used_sources, is_weak_answer, strip_source_tags, truncate_for_display};
pub use context::{build_context, ContextAssembler};
pub use prompt::{build_user_prompt, SYSTEM_PROMPT};
