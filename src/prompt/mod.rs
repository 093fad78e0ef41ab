//! Prompt rule injector
//!
//! Assembles the system prompt for one model request: verbosity selection,
//! intent-driven rule fragments, context-specific sections, and token-budget
//! trimming. Pure string assembly over static tables; no I/O.

mod injector;
pub mod intent;
pub mod providers;
pub mod rules;
pub mod validation;
mod verbosity;

pub use injector::{
    DatabaseContext, DesignContext, GeneratedPrompt, ProjectType, PromptMode, PromptOptions,
    estimate_tokens, generate_prompt,
};
pub use intent::{Complexity, Confidence, DetectedIntent, IntentCategory, IntentContext};
pub use providers::ProviderCategory;
pub use rules::RuleCategory;
pub use validation::{Severity, ValidationFinding};
pub use verbosity::Verbosity;
