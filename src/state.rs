//! Shared workspace state: the rule list and source text.
//!
//! Direct user edits and assistant tool invocations both land here, through
//! the same entry points, so the debounced preview scheduler observes every
//! change uniformly. Preview results are published over a watch channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::watch;

use crate::assistant::tool_bridge::{ToolDispatcher, ToolOp};
use crate::pipeline::scheduler::{DEBOUNCE_WINDOW, PreviewScheduler};
use crate::pipeline::{self, PipelineResult};
use crate::rules::{self, Rule, RulePatch, RuleStoreError, interchange};

#[derive(Debug, Default)]
struct WorkspaceInner {
    rules: Vec<Rule>,
    source_text: String,
}

/// The live workspace. Cheap to share; all mutation goes through `&self`.
pub struct Workspace {
    inner: Arc<Mutex<WorkspaceInner>>,
    scheduler: PreviewScheduler,
    preview_rx: watch::Receiver<PipelineResult>,
}

impl Workspace {
    pub fn new(rules: Vec<Rule>, source_text: String, window: Duration) -> Self {
        let inner = Arc::new(Mutex::new(WorkspaceInner { rules, source_text }));
        let (preview_tx, preview_rx) = watch::channel(PipelineResult::default());

        let job_state = Arc::clone(&inner);
        let scheduler = PreviewScheduler::new(window, move || {
            let (rules, text) = {
                let state = job_state.lock().expect("workspace state poisoned");
                (state.rules.clone(), state.source_text.clone())
            };
            let result = pipeline::run(&text, &rules);
            let _ = preview_tx.send(result);
        });

        Self {
            inner,
            scheduler,
            preview_rx,
        }
    }

    /// Workspace seeded with the sample rules and text.
    pub fn with_defaults() -> Self {
        Self::new(
            rules::DEFAULT_RULES.clone(),
            rules::DEFAULT_TEXT.to_string(),
            DEBOUNCE_WINDOW,
        )
    }

    /// Subscribe to debounced preview results.
    pub fn preview(&self) -> watch::Receiver<PipelineResult> {
        self.preview_rx.clone()
    }

    /// Run the pipeline immediately, bypassing the debounce window.
    pub fn run_now(&self) -> PipelineResult {
        self.scheduler.flush();
        self.preview_rx.borrow().clone()
    }

    /// Quiescent copy of the rules and source text.
    pub fn snapshot(&self) -> (Vec<Rule>, String) {
        let state = self.inner.lock().expect("workspace state poisoned");
        (state.rules.clone(), state.source_text.clone())
    }

    // ------------------------------------------------------------------
    // Mutation entry points. Every one of these nudges the scheduler.
    // ------------------------------------------------------------------

    /// Append a new active rule at the end of the pipeline.
    pub fn add_rule(
        &self,
        name: impl Into<String>,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Rule {
        let rule = {
            let mut state = self.inner.lock().expect("workspace state poisoned");
            let order = state.rules.len() as i64;
            let rule = Rule::new(name, pattern, replacement, order);
            state.rules.push(rule.clone());
            rule
        };
        self.scheduler.schedule();
        rule
    }

    pub fn update_rule(&self, id: &str, patch: RulePatch) -> Result<(), RuleStoreError> {
        {
            let mut state = self.inner.lock().expect("workspace state poisoned");
            let rule = state
                .rules
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| RuleStoreError::NotFound(id.to_string()))?;
            patch.apply(rule);
        }
        self.scheduler.schedule();
        Ok(())
    }

    pub fn delete_rule(&self, id: &str) -> Result<(), RuleStoreError> {
        {
            let mut state = self.inner.lock().expect("workspace state poisoned");
            let index = state
                .rules
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| RuleStoreError::NotFound(id.to_string()))?;
            state.rules.remove(index);
        }
        self.scheduler.schedule();
        Ok(())
    }

    /// Flip a rule's activation flag; returns the new state.
    pub fn toggle_rule(&self, id: &str) -> Result<bool, RuleStoreError> {
        let active = {
            let mut state = self.inner.lock().expect("workspace state poisoned");
            let rule = state
                .rules
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| RuleStoreError::NotFound(id.to_string()))?;
            rule.active = !rule.active;
            rule.active
        };
        self.scheduler.schedule();
        Ok(active)
    }

    /// Move a rule to a new position and renumber all order keys 0..n.
    pub fn move_rule(&self, id: &str, to_index: usize) -> Result<(), RuleStoreError> {
        {
            let mut state = self.inner.lock().expect("workspace state poisoned");
            let from = state
                .rules
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| RuleStoreError::NotFound(id.to_string()))?;
            if to_index >= state.rules.len() {
                return Err(RuleStoreError::BadIndex(to_index));
            }
            let rule = state.rules.remove(from);
            state.rules.insert(to_index, rule);
            for (i, rule) in state.rules.iter_mut().enumerate() {
                rule.order = i as i64;
            }
        }
        self.scheduler.schedule();
        Ok(())
    }

    pub fn set_source_text(&self, text: impl Into<String>) {
        {
            let mut state = self.inner.lock().expect("workspace state poisoned");
            state.source_text = text.into();
        }
        self.scheduler.schedule();
    }

    /// Drop all rules and the source text.
    pub fn clear(&self) {
        {
            let mut state = self.inner.lock().expect("workspace state poisoned");
            state.rules.clear();
            state.source_text.clear();
        }
        self.scheduler.schedule();
    }

    /// Restore the sample rules and text.
    pub fn reset_defaults(&self) {
        {
            let mut state = self.inner.lock().expect("workspace state poisoned");
            state.rules = rules::DEFAULT_RULES.clone();
            state.source_text = rules::DEFAULT_TEXT.to_string();
        }
        self.scheduler.schedule();
    }

    /// Import interchange JSON, appending after existing rules. Returns the
    /// number of rules imported.
    pub fn import_json(&self, json: &str) -> Result<usize> {
        let count = {
            let mut state = self.inner.lock().expect("workspace state poisoned");
            let imported = interchange::import_rules(json, state.rules.len() as i64)?;
            let count = imported.len();
            state.rules.extend(imported);
            count
        };
        self.scheduler.schedule();
        Ok(count)
    }

    pub fn export_json(&self) -> String {
        let state = self.inner.lock().expect("workspace state poisoned");
        interchange::export_rules(&state.rules)
    }
}

// ============================================================================
// Tool Dispatch
// ============================================================================

/// The assistant mutates the workspace through the same entry points as the
/// user; one exhaustive match covers the closed tool vocabulary.
#[async_trait]
impl ToolDispatcher for Workspace {
    async fn dispatch(&self, op: ToolOp) -> Result<Value> {
        match op {
            ToolOp::UpdateRule {
                id,
                name,
                regex,
                replace,
            } => {
                self.update_rule(
                    &id,
                    RulePatch {
                        name,
                        pattern: regex,
                        replacement: replace,
                        active: None,
                    },
                )?;
                Ok(json!({ "status": "updated", "id": id }))
            }
            ToolOp::AddRule {
                name,
                regex,
                replace,
            } => {
                let rule = self.add_rule(name, regex, replace);
                Ok(json!({ "status": "created", "id": rule.id }))
            }
            ToolOp::UpdateSourceText { text } => {
                self.set_source_text(text);
                Ok(json!({ "status": "updated_text" }))
            }
        }
    }
}
