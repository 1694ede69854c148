//! System preamble for the assistant.
//!
//! Built once per call from a snapshot of the workspace; tool-driven
//! mutations during the call never rewrite text already sent to the model.

use super::Language;
use crate::rules::Rule;

/// Render the system instruction embedding the rule/text snapshot and the
/// response-language directive.
pub fn build_system_prompt(rules: &[Rule], source_text: &str, language: Language) -> String {
    let rule_list = rules
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[{}] ID: {}\n    Name: {}\n    Active: {}\n    Regex: {}\n    Replace: {}",
                i + 1,
                r.id,
                r.name,
                r.active,
                r.pattern,
                r.replacement
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let reply_language = match language {
        Language::Zh => "SIMPLIFIED CHINESE (中文)",
        Language::En => "ENGLISH",
    };
    let confirm_language = match language {
        Language::Zh => "Chinese",
        Language::En => "English",
    };

    format!(
        r#"You are an expert Regex & HTML Engineer for the regexlab workbench.
User is building a regex replacement pipeline to convert raw text into rich HTML UI.

CURRENT STATE:
=== Source Text ===
{source_text}

=== Current Rules ({count} total) ===
{rule_list}

Your goal is to help the user write correct regex, fix HTML structure, and debug pipeline issues.

CRITICAL INSTRUCTIONS:
1. **LANGUAGE**: You MUST reply in {reply_language}.
2. **TOOL USAGE**: You have tools to DIRECTLY MODIFY the app state:
   - updateRule: Update existing rules (name, regex, replace)
   - addRule: Create new rules
   - updateSourceText: Modify the source text
3. **WHEN TO USE TOOLS**:
   - When user asks to "fix", "change", "update", "add" anything
   - When you identify issues that need correction
   - DO NOT just tell the user what to change - USE THE TOOLS to make the changes
4. **AFTER TOOL USE**: Briefly confirm what you changed in {confirm_language}.
5. **RULE IDs**: Always use the exact ID from the current rules list above.
"#,
        count = rules.len(),
    )
}
