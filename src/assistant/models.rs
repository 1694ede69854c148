//! Model discovery for both endpoints.
//!
//! Normalizes the native model listing and the assorted shapes
//! OpenAI-compatible proxies return into a flat sorted list of identifiers.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::providers::REQUEST_TIMEOUT_SECS;
use super::AssistantError;
use crate::config::Settings;

const GEMINI_MODELS_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Query the configured endpoint for available model identifiers, sorted.
pub async fn list_models(settings: &Settings) -> Result<Vec<String>, AssistantError> {
    let api_key = settings.api_key().ok_or(AssistantError::NoCredentials)?;
    let client = Client::new();

    let request = if settings.uses_native_endpoint() {
        client.get(format!("{GEMINI_MODELS_URL}?key={api_key}"))
    } else {
        let base_url = settings
            .clean_base_url()
            .ok_or_else(|| AssistantError::Transport("Base URL must not be empty".to_string()))?;
        client
            .get(format!("{base_url}/v1/models"))
            .header("Authorization", format!("Bearer {api_key}"))
    };

    let response = request
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|e| AssistantError::Transport(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let body = response.text().await.unwrap_or_default();
        return Err(AssistantError::RateLimited(body));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AssistantError::Transport(format!(
            "HTTP {status} - {body}"
        )));
    }

    let payload: Value = response
        .json()
        .await
        .map_err(|e| AssistantError::Transport(e.to_string()))?;

    let mut models = if settings.uses_native_endpoint() {
        normalize_native_models(&payload)
    } else {
        normalize_proxy_models(&payload)
    };

    if models.is_empty() {
        return Err(AssistantError::EmptyModelList);
    }

    models.sort();
    Ok(models)
}

/// Native listing: `{ models: [{ name: "models/x", supportedGenerationMethods: [...] }] }`,
/// keeping only models that support `generateContent`.
fn normalize_native_models(payload: &Value) -> Vec<String> {
    let Some(entries) = payload.get("models").and_then(Value::as_array) else {
        return vec![];
    };

    entries
        .iter()
        .filter(|entry| {
            entry
                .get("supportedGenerationMethods")
                .and_then(Value::as_array)
                .is_some_and(|methods| {
                    methods.iter().any(|m| m.as_str() == Some("generateContent"))
                })
        })
        .filter_map(|entry| entry.get("name").and_then(Value::as_str))
        .map(|name| name.strip_prefix("models/").unwrap_or(name).to_string())
        .collect()
}

/// Proxy listing, any of: `{ data: [...] }`, a bare array, or
/// `{ models: [...] }`; entries are objects with `id`/`name` or bare strings.
fn normalize_proxy_models(payload: &Value) -> Vec<String> {
    let entries = payload
        .get("data")
        .and_then(Value::as_array)
        .or_else(|| payload.as_array())
        .or_else(|| payload.get("models").and_then(Value::as_array));

    let Some(entries) = entries else {
        return vec![];
    };

    entries.iter().filter_map(model_entry_id).collect()
}

fn model_entry_id(entry: &Value) -> Option<String> {
    entry
        .as_str()
        .or_else(|| entry.get("id").and_then(Value::as_str))
        .or_else(|| entry.get("name").and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_native_listing_filters_and_strips() {
        let payload = json!({
            "models": [
                { "name": "models/gemini-2.0-flash-exp",
                  "supportedGenerationMethods": ["generateContent", "countTokens"] },
                { "name": "models/embedding-001",
                  "supportedGenerationMethods": ["embedContent"] },
                { "name": "models/no-methods" }
            ]
        });
        assert_eq!(
            normalize_native_models(&payload),
            vec!["gemini-2.0-flash-exp"]
        );
    }

    #[test]
    fn test_proxy_data_object_shape() {
        let payload = json!({ "data": [{ "id": "b" }, { "id": "a" }] });
        assert_eq!(normalize_proxy_models(&payload), vec!["b", "a"]);
    }

    #[test]
    fn test_proxy_bare_array_shapes() {
        let objects = json!([{ "id": "m1" }, { "name": "m2" }]);
        assert_eq!(normalize_proxy_models(&objects), vec!["m1", "m2"]);

        let strings = json!(["m1", "m2"]);
        assert_eq!(normalize_proxy_models(&strings), vec!["m1", "m2"]);
    }

    #[test]
    fn test_proxy_models_object_shape() {
        let payload = json!({ "models": [{ "id": "x" }] });
        assert_eq!(normalize_proxy_models(&payload), vec!["x"]);
    }

    #[test]
    fn test_unusable_entries_are_skipped() {
        let payload = json!({ "data": [42, { "size": 3 }, { "id": "ok" }] });
        assert_eq!(normalize_proxy_models(&payload), vec!["ok"]);
    }
}
