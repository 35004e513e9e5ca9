//! Gemini text generation over the REST `generateContent` endpoint.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};

use super::generator::TextGenerator;
use crate::error::GeneratorError;
use crate::storage::LlmConfig;

/// Blocking [`TextGenerator`] backed by Gemini.
///
/// Owns a single-threaded runtime so callers stay synchronous. Must not be
/// called from inside another async runtime.
pub struct GeminiClient {
    http: Client,
    runtime: tokio::runtime::Runtime,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f64,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GeneratorError> {
        let http = Client::builder().timeout(timeout).build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| GeneratorError::Request(format!("runtime: {e}")))?;
        Ok(Self {
            http,
            runtime,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
            temperature: 0.4,
            max_output_tokens: 2048,
        })
    }

    /// Build from configuration, reading the key from `cfg.api_key_env`.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self, GeneratorError> {
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                GeneratorError::NotConfigured(format!("gemini ({} is not set)", cfg.api_key_env))
            })?;
        Ok(Self::new(
            &cfg.endpoint,
            &cfg.model,
            api_key,
            Duration::from_secs(cfg.timeout_secs),
        )?
        .with_sampling(cfg.temperature, cfg.max_output_tokens))
    }

    pub fn with_sampling(mut self, temperature: f64, max_output_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_output_tokens = max_output_tokens;
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }

    fn request_body(&self, prompt: &str, system: &str) -> Value {
        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            },
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }
}

impl TextGenerator for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, prompt: &str, system: &str) -> Result<String, GeneratorError> {
        tracing::debug!(model = %self.model, chars = prompt.len(), "calling gemini");
        let body = self.request_body(prompt, system);

        let resp: Value = self.runtime.block_on(async {
            let resp = self
                .http
                .post(self.url())
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(GeneratorError::Request(format!(
                    "Gemini API error (HTTP {status}): {text}"
                )));
            }
            Ok(resp.json::<Value>().await?)
        })?;

        let text = response_text(&resp);
        if text.trim().is_empty() {
            return Err(GeneratorError::EmptyResponse);
        }
        tracing::debug!(chars = text.len(), "gemini response received");
        Ok(text)
    }
}

/// Concatenated text parts of the first candidate.
fn response_text(resp: &Value) -> String {
    resp["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> GeminiClient {
        GeminiClient::new(url, "test-model", "secret", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn returns_candidate_text() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1beta/models/test-model:generateContent")
            .match_header("x-goog-api-key", "secret")
            .match_body(mockito::Matcher::PartialJson(json!({
                "systemInstruction": { "parts": [{ "text": "sys" }] },
                "generationConfig": { "maxOutputTokens": 2048 }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[{"content":{"parts":[{"text":"{\"findings\":"},{"text":"[]}"}]}}]}"#,
            )
            .create();

        let text = client(&server.url()).generate("prompt", "sys").unwrap();
        assert_eq!(text, r#"{"findings":[]}"#);
        mock.assert();
    }

    #[test]
    fn http_error_is_request_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/v1beta/models/test-model:generateContent")
            .with_status(429)
            .with_body("quota")
            .create();

        let err = client(&server.url()).generate("prompt", "").unwrap_err();
        match err {
            GeneratorError::Request(msg) => assert!(msg.contains("429")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_candidates_is_empty_response() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/v1beta/models/test-model:generateContent")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[]}"#)
            .create();

        assert!(matches!(
            client(&server.url()).generate("prompt", ""),
            Err(GeneratorError::EmptyResponse)
        ));
    }

    #[test]
    fn from_config_requires_key() {
        let cfg = LlmConfig {
            api_key_env: "DRIFTMIRROR_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            GeminiClient::from_config(&cfg),
            Err(GeneratorError::NotConfigured(_))
        ));
    }

    #[test]
    fn body_omits_empty_system() {
        let body = client("http://localhost").request_body("p", "");
        assert!(body.get("systemInstruction").is_none());
        assert_eq!(body["contents"][0]["parts"][0]["text"], "p");
    }
}
