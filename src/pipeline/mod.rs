//! Rule pipeline executor.
//!
//! Applies the ordered, active subset of rules to a source text and produces
//! the transformed result plus a per-rule diagnostic log. Every run is a
//! wholesale recomputation; there is no incremental update.

pub mod compiler;
pub mod scheduler;

use std::time::Instant;

use serde::Serialize;

use crate::rules::Rule;
use compiler::CompiledPattern;

/// Cosmetic scrollbar styling prepended to every result. A constant, not
/// rule-dependent.
pub const PREVIEW_STYLE_HEADER: &str = "\n    <style>\n      ::-webkit-scrollbar { width: 6px; height: 6px; }\n      ::-webkit-scrollbar-track { background: transparent; }\n      ::-webkit-scrollbar-thumb { background: rgba(128, 128, 128, 0.3); border-radius: 3px; }\n      ::-webkit-scrollbar-thumb:hover { background: rgba(128, 128, 128, 0.5); }\n    </style>\n  ";

/// Outcome of one rule's step in a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticEntry {
    pub rule_id: String,
    pub rule_name: String,
    pub matched: bool,
    pub match_count: usize,
    /// Wall-clock time of this rule's own compile+substitute step.
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a pipeline run. One diagnostic per active rule, in execution
/// order, regardless of success or failure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineResult {
    pub final_text: String,
    pub diagnostics: Vec<DiagnosticEntry>,
}

/// Run the pipeline over `source_text`.
///
/// Rules are stable-sorted by `order` (ties keep their original relative
/// position) and filtered to the active subset. A rule whose pattern fails to
/// compile is skipped: its diagnostic carries the error and the text flows to
/// the next rule unchanged.
pub fn run(source_text: &str, rules: &[Rule]) -> PipelineResult {
    let mut ordered: Vec<&Rule> = rules.iter().collect();
    ordered.sort_by_key(|r| r.order);
    let active: Vec<&Rule> = ordered.into_iter().filter(|r| r.active).collect();

    // Empty source: preview the static template shape of all rule outputs
    // by concatenating replacements in order, without running any matcher.
    if source_text.is_empty() {
        let mut preview = String::new();
        let mut diagnostics = Vec::with_capacity(active.len());
        for rule in &active {
            preview.push_str(&rule.replacement);
            diagnostics.push(DiagnosticEntry {
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                matched: false,
                match_count: 0,
                elapsed_ms: 0.0,
                error: None,
            });
        }
        return PipelineResult {
            final_text: format!("{PREVIEW_STYLE_HEADER}{preview}"),
            diagnostics,
        };
    }

    let mut current = source_text.to_string();
    let mut diagnostics = Vec::with_capacity(active.len());

    for rule in &active {
        let started = Instant::now();
        let (next, match_count, error) = match CompiledPattern::compile(&rule.pattern) {
            Ok(pattern) => {
                let (next, count) = pattern.substitute(&current, &rule.replacement);
                (next, count, None)
            }
            Err(e) => (current.clone(), 0, Some(e.to_string())),
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        diagnostics.push(DiagnosticEntry {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            matched: match_count > 0,
            match_count,
            elapsed_ms,
            error,
        });
        current = next;
    }

    PipelineResult {
        final_text: format!("{PREVIEW_STYLE_HEADER}{current}"),
        diagnostics,
    }
}
