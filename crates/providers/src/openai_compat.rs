//! OpenAI-compatible generation backend.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, and any endpoint exposing
//! `/v1/chat/completions`. One call per `generate`, non-streaming, always
//! with an explicit `max_tokens`.

use async_trait::async_trait;
use dossier_core::error::BackendError;
use dossier_core::{GenerationBackend, Prompt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// An OpenAI-compatible chat-completions backend.
pub struct OpenAiCompatBackend {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    /// Create a new backend.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BackendError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
            client,
        })
    }

    /// Create an OpenAI backend (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, BackendError> {
        Self::new(
            "openai",
            "https://api.openai.com/v1",
            api_key,
            model,
            Duration::from_secs(180),
        )
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_api_messages(prompt: &Prompt) -> Vec<ApiMessage> {
        let mut messages = Vec::with_capacity(2);
        if !prompt.system.is_empty() {
            messages.push(ApiMessage {
                role: "system".into(),
                content: Some(prompt.system.clone()),
            });
        }
        messages.push(ApiMessage {
            role: "user".into(),
            content: Some(prompt.user.clone()),
        });
        messages
    }

    fn request_body(&self, prompt: &Prompt, max_tokens: u32) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(prompt),
            "temperature": self.temperature,
            "max_tokens": max_tokens,
            "stream": false,
        })
    }
}

/// Map a non-success HTTP status to a backend error.
fn status_error(status: u16, retry_after: Option<u64>, body: String) -> BackendError {
    match status {
        429 => BackendError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(5),
        },
        401 | 403 => {
            BackendError::AuthenticationFailed("Invalid API key or insufficient permissions".into())
        }
        _ => BackendError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

#[async_trait]
impl GenerationBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        target_token_budget: u32,
    ) -> std::result::Result<String, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(prompt, target_token_budget);

        debug!(
            backend = %self.name,
            model = %self.model,
            max_tokens = target_token_budget,
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(e.to_string())
                } else {
                    BackendError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Backend returned error");
            return Err(status_error(status, retry_after, error_body));
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| BackendError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        extract_text(api_response)
    }

    async fn health_check(&self) -> std::result::Result<bool, BackendError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

/// Pull the assistant text out of a response. Blank output is an error: it
/// usually means the ceiling was spent before any text was produced.
fn extract_text(api_response: ApiResponse) -> Result<String, BackendError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::ApiError {
            status_code: 200,
            message: "No choices in response".into(),
        })?;

    let text = choice.message.content.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(BackendError::EmptyOutput(format!(
            "finish_reason={}",
            choice.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    if let Some(usage) = api_response.usage {
        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Completion usage"
        );
    }
    Ok(text)
}

// --- OpenAI API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> OpenAiCompatBackend {
        OpenAiCompatBackend::new(
            "test",
            "http://localhost:9/v1/",
            "sk-test",
            "gpt-test",
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn base_url_is_normalized() {
        assert_eq!(backend().base_url, "http://localhost:9/v1");
    }

    #[test]
    fn body_carries_explicit_ceiling() {
        let body = backend().request_body(&Prompt::new("sys", "user"), 1234);
        assert_eq!(body["max_tokens"], 1234);
        assert_eq!(body["model"], "gpt-test");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "user");
    }

    #[test]
    fn empty_system_prompt_is_omitted() {
        let messages = OpenAiCompatBackend::to_api_messages(&Prompt::new("", "only user"));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(429, Some(12), String::new()),
            BackendError::RateLimited { retry_after_secs: 12 }
        ));
        assert!(matches!(
            status_error(401, None, String::new()),
            BackendError::AuthenticationFailed(_)
        ));
        let err = status_error(503, None, "overloaded".into());
        assert!(err.is_transient());
        assert!(!status_error(400, None, "bad".into()).is_transient());
    }

    #[test]
    fn blank_completion_is_empty_output() {
        let response: ApiResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  "}, "finish_reason": "length"}]
        }))
        .unwrap();
        let err = extract_text(response).unwrap_err();
        assert!(matches!(err, BackendError::EmptyOutput(ref m) if m.contains("length")));
    }

    #[test]
    fn completion_text_is_returned() {
        let response: ApiResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Apple earns..."}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3}
        }))
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "Apple earns...");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let err = backend()
            .generate(&Prompt::new("", "hi"), 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BackendError::Network(_) | BackendError::Timeout(_)
        ));
    }
}
