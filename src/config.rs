//! Configuration for regexlab.
//!
//! Settings resolve CLI args > environment > ~/.regexlab/config.toml.

use serde::Deserialize;
use std::path::PathBuf;

use crate::assistant::Language;
use crate::assistant::providers::DEFAULT_MODEL;

/// Resolved runtime settings.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// API key for the configured endpoint.
    pub api_key: Option<String>,
    /// OpenAI-compatible proxy base URL. Empty or googleapis.com selects the
    /// native endpoint.
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub language: Language,
}

impl Settings {
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }

    /// Trimmed base URL without a trailing slash; `None` when unset/blank.
    pub fn clean_base_url(&self) -> Option<String> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|u| u.trim_end_matches('/').to_string())
    }

    /// True when requests should go to the native provider directly.
    pub fn uses_native_endpoint(&self) -> bool {
        match self.clean_base_url() {
            None => true,
            Some(url) => url.contains("googleapis.com"),
        }
    }

    pub fn model_or_default(&self) -> &str {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL)
    }
}

/// On-disk configuration (~/.regexlab/config.toml).
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub language: Option<Language>,
}

impl Config {
    /// Load config from ~/.regexlab/config.toml
    pub fn load() -> Self {
        let path = config_path();

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".regexlab")
        .join("config.toml")
}
