//! Script interchange format (import/export).
//!
//! Rules travel as an array of script objects compatible with the tavern
//! ecosystem: `scriptName`/`findRegex`/`replaceString`/`disabled` plus a set
//! of fields this app does not interpret. Import tolerates unknown fields and
//! carries them opaquely; export emits fixed constants for the uninterpreted
//! fields, never values derived from app state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::Rule;

/// One script object in the interchange array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "scriptName", skip_serializing_if = "Option::is_none")]
    pub script_name: Option<String>,
    #[serde(default, rename = "findRegex", skip_serializing_if = "Option::is_none")]
    pub find_regex: Option<String>,
    #[serde(default, rename = "replaceString", skip_serializing_if = "Option::is_none")]
    pub replace_string: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, rename = "runOnEdit", skip_serializing_if = "Option::is_none")]
    pub run_on_edit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Vec<i64>>,
    #[serde(default, rename = "trimStrings", skip_serializing_if = "Option::is_none")]
    pub trim_strings: Option<Vec<String>>,
    #[serde(default, rename = "substituteRegex", skip_serializing_if = "Option::is_none")]
    pub substitute_regex: Option<i64>,
    #[serde(default, rename = "markdownOnly", skip_serializing_if = "Option::is_none")]
    pub markdown_only: Option<bool>,
    #[serde(default, rename = "promptOnly", skip_serializing_if = "Option::is_none")]
    pub prompt_only: Option<bool>,
    /// Fields this app does not interpret, preserved opaquely.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScriptRecord {
    /// Convert an imported record into a rule. `index` is the record's
    /// position in the payload, `next_order` the order key to assign.
    fn into_rule(self, index: usize, next_order: i64) -> Rule {
        Rule {
            id: self
                .id
                .unwrap_or_else(|| format!("imported-{}", Uuid::new_v4())),
            name: self
                .script_name
                .unwrap_or_else(|| format!("Script {index}")),
            pattern: self.find_regex.unwrap_or_default(),
            replacement: self.replace_string.unwrap_or_default(),
            active: !self.disabled,
            order: next_order,
        }
    }

    fn from_rule(rule: &Rule) -> Self {
        Self {
            id: Some(rule.id.clone()),
            script_name: Some(rule.name.clone()),
            find_regex: Some(rule.pattern.clone()),
            replace_string: Some(rule.replacement.clone()),
            disabled: !rule.active,
            // Fixed constants below: not derived from app state.
            run_on_edit: Some(true),
            placement: Some(vec![1, 2]),
            trim_strings: Some(vec![]),
            substitute_regex: Some(0),
            markdown_only: Some(false),
            prompt_only: Some(false),
            extra: Map::new(),
        }
    }
}

/// Parse an interchange payload into rules. Accepts an array of script
/// objects or a single bare object. Rules are ordered after `next_order`.
pub fn import_rules(json: &str, next_order: i64) -> Result<Vec<Rule>, serde_json::Error> {
    let parsed: Value = serde_json::from_str(json)?;
    let records: Vec<ScriptRecord> = if parsed.is_array() {
        serde_json::from_value(parsed)?
    } else {
        vec![serde_json::from_value(parsed)?]
    };

    Ok(records
        .into_iter()
        .enumerate()
        .map(|(idx, record)| record.into_rule(idx, next_order + idx as i64))
        .collect())
}

/// Serialize rules to the interchange format (pretty-printed array).
pub fn export_rules(rules: &[Rule]) -> String {
    let records: Vec<ScriptRecord> = rules.iter().map(ScriptRecord::from_rule).collect();
    // Serializing plain data structures cannot fail.
    serde_json::to_string_pretty(&records).unwrap_or_else(|_| "[]".to_string())
}
