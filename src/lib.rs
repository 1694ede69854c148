//! regexlab - regex pipeline workbench with an AI assistant.
//!
//! An ordered chain of pattern/replacement rules is applied to a source text
//! to produce a live preview plus per-rule diagnostics. A conversational
//! assistant can inspect and mutate the rule chain through a constrained
//! tool-call protocol, against either the native Gemini API or any
//! OpenAI-compatible proxy.

pub mod assistant;
pub mod config;
pub mod pipeline;
pub mod repl;
pub mod rules;
pub mod state;

pub use pipeline::{DiagnosticEntry, PipelineResult};
pub use rules::Rule;
pub use state::Workspace;
