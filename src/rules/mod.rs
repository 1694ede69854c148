//! Rule model for the substitution pipeline.
//!
//! A rule pairs a pattern specification with a replacement template. Rules
//! carry an order key that defines execution order and an activation flag;
//! inactive rules are invisible to the pipeline.

pub mod interchange;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One pattern/replacement unit in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Opaque id, stable across reorders.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Raw pattern specification, e.g. `/abc/gi` or just `abc`.
    pub pattern: String,
    /// Replacement template; `$n` resolves to the n-th capturing group.
    pub replacement: String,
    pub active: bool,
    /// Execution order key. Not required to be contiguous.
    pub order: i64,
}

impl Rule {
    /// Create an active rule with a fresh id.
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
        order: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            pattern: pattern.into(),
            replacement: replacement.into(),
            active: true,
            order,
        }
    }
}

/// Partial update applied to an existing rule. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct RulePatch {
    pub name: Option<String>,
    pub pattern: Option<String>,
    pub replacement: Option<String>,
    pub active: Option<bool>,
}

impl RulePatch {
    pub fn apply(self, rule: &mut Rule) {
        if let Some(name) = self.name {
            rule.name = name;
        }
        if let Some(pattern) = self.pattern {
            rule.pattern = pattern;
        }
        if let Some(replacement) = self.replacement {
            rule.replacement = replacement;
        }
        if let Some(active) = self.active {
            rule.active = active;
        }
    }
}

/// Rule store error types
#[derive(Debug, thiserror::Error)]
pub enum RuleStoreError {
    #[error("Rule ID not found: {0}")]
    NotFound(String),

    #[error("Index out of range: {0}")]
    BadIndex(usize),
}

/// Sample source text shown on first launch.
pub const DEFAULT_TEXT: &str = "\
< 2B >\n\
( The machine lifeforms here behave strangely. Stay alert. )\n\
[ Abandoned Factory :: Furnace ]\n\
LOVE: 65 / 100 | STATUS: Alert\n\
\n\
< 9S >\n\
( I'm hacking the factory network... this data stream, it's like crying. )\n\
[ Abandoned Factory :: Server Room ]\n\
LOVE: 92 / 100 | STATUS: Hacking\n";

/// Sample rules demonstrating a two-stage pipeline: parse character blocks
/// into cards, then wrap everything in a document shell.
pub static DEFAULT_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule {
            id: "rule-doc-shell".into(),
            name: "1. Document shell".into(),
            pattern: r"/([\s\S]+)/".into(),
            replacement: "<!DOCTYPE html>\n<html>\n<head>\n<style>\n\
                          body { background: #050505; color: #e0e0e0; font-family: monospace; }\n\
                          .char-card { border: 2px solid #00ffff; margin: 12px; padding: 10px; }\n\
                          .name { color: #ccff00; font-weight: bold; }\n\
                          .voice { color: #00ffff; font-style: italic; }\n\
                          .stats { color: #888; font-size: 0.9em; }\n\
                          </style>\n</head>\n<body>\n<div class=\"card-container\">\n$1\n</div>\n</body>\n</html>"
                .into(),
            active: true,
            order: 2,
        },
        Rule {
            id: "rule-char-card".into(),
            name: "2. Character cards".into(),
            pattern: r"/< (.+?) >\s*\n\( (.+?) \)\s*\n\[ (.+?) \]\s*\nLOVE: (\d+) \/ 100 \| STATUS: (.+?)\n/g"
                .into(),
            replacement: "<div class=\"char-card\">\n\
                          <div class=\"name\">$1 <span class=\"stats\">[$3]</span></div>\n\
                          <div class=\"voice\">\"$2\"</div>\n\
                          <div class=\"stats\">LOVE: $4% | STATUS: $5</div>\n\
                          </div>"
                .into(),
            active: true,
            order: 1,
        },
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rule_is_active_with_fresh_id() {
        let a = Rule::new("r", "/a/g", "b", 0);
        let b = Rule::new("r", "/a/g", "b", 0);
        assert!(a.active);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut rule = Rule::new("old", "/a/", "x", 0);
        RulePatch {
            name: Some("new".into()),
            active: Some(false),
            ..Default::default()
        }
        .apply(&mut rule);
        assert_eq!(rule.name, "new");
        assert_eq!(rule.pattern, "/a/");
        assert!(!rule.active);
    }

    #[test]
    fn test_default_rules_orders_are_not_positional() {
        // The sample set executes card parsing before the document shell.
        assert_eq!(DEFAULT_RULES[0].order, 2);
        assert_eq!(DEFAULT_RULES[1].order, 1);
    }
}
