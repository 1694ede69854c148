//! Pattern specification parsing and compilation.
//!
//! A specification is either `/body/flags` (flags drawn from `gimsuy`) or a
//! bare body, which gets the default mode: apply globally, no implicit
//! anchoring. An empty specification compiles to a matcher that matches
//! nothing.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Recognizes the delimited `/body/flags` form. `(?s)` lets the body span
/// lines; the greedy body takes everything up to the last slash that leaves a
/// valid flag suffix.
static DELIMITED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^/(.*)/([gimsuy]*)$").expect("delimiter grammar"));

/// Pattern compilation error types
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("{0}")]
    Syntax(String),
}

/// A compiled matcher plus its replacement mode.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// `None` matches nothing (compiled from an empty specification).
    regex: Option<Regex>,
    /// Replace every match (`g`) vs. only the first.
    global: bool,
}

impl CompiledPattern {
    /// Compile a raw pattern specification.
    pub fn compile(spec: &str) -> Result<Self, PatternError> {
        if spec.is_empty() {
            return Ok(Self {
                regex: None,
                global: true,
            });
        }

        let (body, flags) = match DELIMITED.captures(spec) {
            Some(caps) => (
                caps.get(1).map_or("", |m| m.as_str()).to_string(),
                caps.get(2).map_or("", |m| m.as_str()).to_string(),
            ),
            // Bare body: whole string is the pattern, global mode.
            None => (spec.to_string(), "g".to_string()),
        };

        let mut builder = RegexBuilder::new(&body);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                // `u` is the engine's native mode; `y` has no positional
                // meaning in this dialect; `g` selects the replace mode.
                'g' | 'u' | 'y' => {}
                _ => unreachable!("flag alphabet enforced by grammar"),
            }
        }

        let regex = builder
            .build()
            .map_err(|e| PatternError::Syntax(e.to_string()))?;

        Ok(Self {
            regex: Some(regex),
            global: flags.contains('g'),
        })
    }

    /// True for the empty-specification matcher.
    pub fn matches_nothing(&self) -> bool {
        self.regex.is_none()
    }

    /// Substitute matches in `text` with the replacement template, resolving
    /// `$n` back-references. Returns the rewritten text and the number of
    /// matches actually replaced, counted in the same pass that rewrites.
    pub fn substitute(&self, text: &str, replacement: &str) -> (String, usize) {
        let Some(regex) = &self.regex else {
            return (text.to_string(), 0);
        };

        let template = normalize_replacement(replacement);
        let mut count = 0usize;
        let rewrite = |caps: &regex::Captures| {
            count += 1;
            let mut expanded = String::new();
            caps.expand(&template, &mut expanded);
            expanded
        };

        let rewritten = if self.global {
            regex.replace_all(text, rewrite).into_owned()
        } else {
            regex.replacen(text, 1, rewrite).into_owned()
        };

        (rewritten, count)
    }
}

/// Rewrite `$n` back-references into the engine's brace form `${n}` so that a
/// group reference followed by a word character keeps its meaning
/// (`$1px` is group 1 then `px`, not a group named `1px`). `$$` stays a
/// literal dollar.
fn normalize_replacement(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                out.push_str("$$");
                chars.next();
            }
            Some(d) if d.is_ascii_digit() => {
                let mut group = String::new();
                while let Some(d) = chars.peek() {
                    if d.is_ascii_digit() {
                        group.push(*d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str("${");
                out.push_str(&group);
                out.push('}');
            }
            _ => out.push('$'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_spec_matches_nothing() {
        let pattern = CompiledPattern::compile("").unwrap();
        assert!(pattern.matches_nothing());
        let (text, count) = pattern.substitute("anything", "X");
        assert_eq!(text, "anything");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_bare_body_is_global() {
        let pattern = CompiledPattern::compile("a").unwrap();
        let (text, count) = pattern.substitute("banana", "x");
        assert_eq!(text, "bxnxnx");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_delimited_without_g_replaces_first_only() {
        let pattern = CompiledPattern::compile("/a/").unwrap();
        let (text, count) = pattern.substitute("banana", "x");
        assert_eq!(text, "bxnana");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_case_insensitive_flag() {
        let pattern = CompiledPattern::compile("/abc/gi").unwrap();
        let (text, count) = pattern.substitute("ABC abc AbC", "-");
        assert_eq!(text, "- - -");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_dotall_and_multiline_flags() {
        let pattern = CompiledPattern::compile("/^b.c$/gms").unwrap();
        let (_, count) = pattern.substitute("a\nb\nc\nd", "-");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_sticky_and_unicode_flags_accepted() {
        assert!(CompiledPattern::compile("/a/yu").is_ok());
    }

    #[test]
    fn test_body_may_contain_slashes() {
        let pattern = CompiledPattern::compile("/a/b/g").unwrap();
        let (text, count) = pattern.substitute("a/b a/b", "-");
        assert_eq!(text, "- -");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_invalid_body_reports_engine_message() {
        let err = CompiledPattern::compile("/[unclosed/g").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_back_references_expand() {
        let pattern = CompiledPattern::compile(r"/(\w+)=(\d+)/g").unwrap();
        let (text, count) = pattern.substitute("x=1 y=2", "$2:$1");
        assert_eq!(text, "1:x 2:y");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_back_reference_followed_by_word_character() {
        let pattern = CompiledPattern::compile(r"/(\d+)/g").unwrap();
        let (text, _) = pattern.substitute("width: 50", "width: $1px");
        assert_eq!(text, "width: 50px");
    }

    #[test]
    fn test_normalize_keeps_literal_dollars() {
        assert_eq!(normalize_replacement("$$1 costs $1"), "$$1 costs ${1}");
        assert_eq!(normalize_replacement("end$"), "end$");
    }
}
