//! Google Generative Language API client.

use super::{GenerationOptions, GenerativeCapability};
use crate::errors::CapabilityError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Base URL of the Generative Language API.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Keys shorter than this are treated as missing.
pub const MIN_API_KEY_LEN: usize = 20;

const MODEL_PREFIX: &str = "gemini/";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Calls `models/{model}:generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiClient {
    /// Creates a client for the given key.
    ///
    /// The key is not checked here; [`GenerativeCapability::preflight`]
    /// reports a missing or malformed key.
    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_timeout(api_key, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client with a custom HTTP timeout.
    #[must_use]
    pub fn with_timeout(api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.map(|k| k.trim().to_string()),
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn key(&self) -> Result<&str, CapabilityError> {
        match self.api_key.as_deref() {
            None | Some("") => Err(CapabilityError::Unavailable(
                "GOOGLE_API_KEY is not set".to_string(),
            )),
            Some(key) if key.len() < MIN_API_KEY_LEN => Err(CapabilityError::Unavailable(
                "GOOGLE_API_KEY looks malformed (too short)".to_string(),
            )),
            Some(key) => Ok(key),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model_path(model))
    }
}

/// Strips the `gemini/` routing prefix from a model name.
fn model_path(model: &str) -> &str {
    model.strip_prefix(MODEL_PREFIX).unwrap_or(model)
}

fn map_status(status: StatusCode, body: &str) -> CapabilityError {
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(body, 300));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CapabilityError::Authentication(message),
        StatusCode::TOO_MANY_REQUESTS => CapabilityError::RateLimited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => CapabilityError::Timeout(message),
        s if s.is_server_error() => CapabilityError::Transport(message),
        _ => CapabilityError::Unavailable(message),
    }
}

fn map_transport(err: &reqwest::Error) -> CapabilityError {
    if err.is_timeout() {
        CapabilityError::Timeout(err.to_string())
    } else {
        CapabilityError::Transport(err.to_string())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Concatenates the text parts of the first candidate.
fn parse_response(body: &str) -> Result<String, CapabilityError> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| CapabilityError::MalformedResponse(e.to_string()))?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(CapabilityError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl GenerativeCapability for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, CapabilityError> {
        let key = self.key()?;
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": options.temperature },
        });

        debug!(model = %model_path(&options.model), prompt_chars = prompt.len(), "Calling generateContent");

        let response = self
            .client
            .post(self.endpoint(&options.model))
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport(&e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| map_transport(&e))?;

        if !status.is_success() {
            return Err(map_status(status, &text));
        }
        parse_response(&text)
    }

    async fn preflight(&self) -> Result<(), CapabilityError> {
        self.key().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "AIzaSyTEST-0123456789abcdef";

    #[test]
    fn test_model_path_strips_prefix() {
        assert_eq!(model_path("gemini/gemini-2.5-flash"), "gemini-2.5-flash");
        assert_eq!(model_path("gemini-2.5-flash"), "gemini-2.5-flash");
    }

    #[test]
    fn test_endpoint() {
        let client = GeminiClient::new(Some(KEY.into())).with_base_url("http://localhost:9/");
        assert_eq!(
            client.endpoint("gemini/gemini-2.5-flash"),
            "http://localhost:9/models/gemini-2.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_preflight_rejects_missing_or_short_key() {
        assert!(matches!(
            GeminiClient::new(None).preflight().await,
            Err(CapabilityError::Unavailable(_))
        ));
        assert!(matches!(
            GeminiClient::new(Some("   ".into())).preflight().await,
            Err(CapabilityError::Unavailable(_))
        ));
        assert!(matches!(
            GeminiClient::new(Some("short".into())).preflight().await,
            Err(CapabilityError::Unavailable(_))
        ));
        assert!(GeminiClient::new(Some(KEY.into())).preflight().await.is_ok());
    }

    #[tokio::test]
    async fn test_generate_without_key_never_calls_out() {
        let client = GeminiClient::new(None).with_base_url("http://127.0.0.1:1");
        let err = client
            .generate("prompt", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Unavailable(_)));
    }

    #[test]
    fn test_map_status() {
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, ""),
            CapabilityError::Authentication(_)
        ));
        assert!(matches!(
            map_status(StatusCode::FORBIDDEN, ""),
            CapabilityError::Authentication(_)
        ));
        assert!(matches!(
            map_status(StatusCode::TOO_MANY_REQUESTS, "quota"),
            CapabilityError::RateLimited(_)
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_GATEWAY, ""),
            CapabilityError::Transport(_)
        ));
        assert!(matches!(
            map_status(StatusCode::GATEWAY_TIMEOUT, ""),
            CapabilityError::Timeout(_)
        ));
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, "no such model"),
            CapabilityError::Unavailable(_)
        ));
    }

    #[test]
    fn test_parse_response_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}]}}]}"#;
        assert_eq!(parse_response(body).unwrap(), "Hello world");
    }

    #[test]
    fn test_parse_response_empty() {
        assert_eq!(
            parse_response(r#"{"candidates":[]}"#).unwrap_err(),
            CapabilityError::EmptyResponse
        );
        assert_eq!(
            parse_response(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#).unwrap_err(),
            CapabilityError::EmptyResponse
        );
        assert_eq!(
            parse_response(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap_err(),
            CapabilityError::EmptyResponse
        );
    }

    #[test]
    fn test_parse_response_malformed() {
        assert!(matches!(
            parse_response("<html>"),
            Err(CapabilityError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("ação", 2), "aç");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
