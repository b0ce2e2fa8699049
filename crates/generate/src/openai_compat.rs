//! OpenAI-compatible generation backend.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM, and any other endpoint
//! exposing `/v1/chat/completions`. Plain chat completion only — the
//! composer assembles the full prompt, this backend just runs it.

use async_trait::async_trait;
use haksa_core::error::GenerationError;
use haksa_core::generate::{GenerationRequest, Generator};
use haksa_core::message::{Message, Role};
use serde::Deserialize;
use tracing::{debug, warn};

/// An OpenAI-compatible answer generator.
pub struct OpenAiCompatGenerator {
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatGenerator {
    pub fn new(
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Convert the request into OpenAI wire messages: system guidance first,
    /// then the history, then the fresh user message.
    fn to_api_messages(request: &GenerationRequest) -> Vec<serde_json::Value> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(serde_json::json!({
            "role": "system",
            "content": request.system,
        }));
        for message in &request.history {
            messages.push(serde_json::json!({
                "role": role_str(message),
                "content": message.content,
            }));
        }
        messages.push(serde_json::json!({
            "role": "user",
            "content": request.user,
        }));
        messages
    }
}

fn role_str(message: &Message) -> &'static str {
    match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

#[async_trait]
impl Generator for OpenAiCompatGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(&request),
            "temperature": request.temperature,
            "stream": false,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(model = %self.model, "Sending completion request");

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
                    GenerationError::Timeout(e.to_string())
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(GenerationError::RateLimited { retry_after_secs: 5 });
        }

        if status == 401 || status == 403 {
            return Err(GenerationError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Generation backend returned error");
            return Err(GenerationError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| GenerationError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let generator =
            OpenAiCompatGenerator::new("gpt-4o-mini", "https://api.openai.com/v1/", "sk-test");
        assert_eq!(generator.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn api_messages_order_system_history_user() {
        let request = GenerationRequest {
            system: "당신은 학과 안내 챗봇입니다.".into(),
            history: vec![Message::user("안녕"), Message::assistant("안녕하세요!")],
            user: "도서관 몇 시까지 해?".into(),
            temperature: 0.3,
            max_tokens: Some(500),
        };
        let messages = OpenAiCompatGenerator::to_api_messages(&request);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["role"], "user");
        assert_eq!(messages[3]["content"], "도서관 몇 시까지 해?");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let generator = OpenAiCompatGenerator::new("gpt-4o-mini", "http://127.0.0.1:1/v1", "sk");
        let result = generator
            .generate(GenerationRequest {
                system: String::new(),
                history: vec![],
                user: "안녕".into(),
                temperature: 0.3,
                max_tokens: None,
            })
            .await;
        assert!(matches!(result, Err(GenerationError::Network(_))));
    }
}
