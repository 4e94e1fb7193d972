//! OpenAI Chat Completions API provider.
//!
//! Works with any OpenAI-compatible `/v1/chat/completions` endpoint using
//! bearer API key authentication.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;
use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

const PROVIDER: &str = "openai";

/// OpenAI Chat Completions API provider.
pub struct OpenAiChatProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiChatProvider {
    /// Create a new provider. Fails without an API key.
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.is_none() {
            return Err(LlmError::AuthFailed {
                provider: PROVIDER.to_string(),
            });
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn api_key(&self) -> &str {
        self.config
            .api_key
            .as_ref()
            .map(|k| k.expose_secret())
            .unwrap_or_default()
    }

    /// Send a request to the chat completions API.
    async fn send_request<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        body: &T,
    ) -> Result<R, LlmError> {
        let url = self.api_url("chat/completions");

        tracing::debug!("Sending request to OpenAI: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        provider: PROVIDER.to_string(),
                        timeout: self.config.timeout,
                    }
                } else {
                    LlmError::RequestFailed {
                        provider: PROVIDER.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let response_text = response.text().await.unwrap_or_default();

        tracing::debug!("OpenAI response status: {}", status);

        if !status.is_success() {
            if status.as_u16() == 401 {
                return Err(LlmError::AuthFailed {
                    provider: PROVIDER.to_string(),
                });
            }
            if status.as_u16() == 429 {
                return Err(LlmError::RateLimited {
                    provider: PROVIDER.to_string(),
                    retry_after: None,
                });
            }
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {}: {}", status, response_text),
            });
        }

        serde_json::from_str(&response_text).map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: format!("JSON parse error: {}. Raw: {}", e, response_text),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiChatProvider {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let request = ChatCompletionRequest {
            model: req.model.unwrap_or_else(|| self.config.model.clone()),
            messages: req.messages.into_iter().map(Into::into).collect(),
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };

        let response: ChatCompletionResponse = self.send_request(&request).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "No choices in response".to_string(),
            })?;

        let usage = response.usage.unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.and_then(|m| m.content).unwrap_or_default(),
            finish_reason: FinishReason::parse(choice.finish_reason.as_deref()),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }
}

// OpenAI Chat Completions API types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatCompletionMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatCompletionMessage {
    role: String,
    content: String,
}

impl From<ChatMessage> for ChatCompletionMessage {
    fn from(msg: ChatMessage) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
        };
        Self {
            role: role.to_string(),
            content: msg.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: Option<ChatCompletionResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatCompletionUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use secrecy::SecretString;
    use tokio::sync::Mutex;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured {
        body: Arc<Mutex<Option<serde_json::Value>>>,
        auth: Arc<Mutex<Option<String>>>,
    }

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn config(base_url: String) -> OpenAiConfig {
        OpenAiConfig {
            api_key: Some(SecretString::from("sk-test")),
            base_url,
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_requires_api_key() {
        let mut cfg = config("http://localhost".to_string());
        cfg.api_key = None;
        assert!(matches!(
            OpenAiChatProvider::new(cfg),
            Err(LlmError::AuthFailed { .. })
        ));
    }

    #[test]
    fn test_message_conversion() {
        let chat_msg: ChatCompletionMessage = ChatMessage::system("Be terse").into();
        assert_eq!(chat_msg.role, "system");
        assert_eq!(chat_msg.content, "Be terse");
    }

    #[tokio::test]
    async fn test_complete_sends_model_and_temperature() {
        let captured = Captured::default();
        let router = Router::new()
            .route(
                "/v1/chat/completions",
                post(
                    |State(captured): State<Captured>,
                     headers: HeaderMap,
                     Json(body): Json<serde_json::Value>| async move {
                        *captured.body.lock().await = Some(body);
                        *captured.auth.lock().await = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        Json(serde_json::json!({
                            "id": "chatcmpl-1",
                            "choices": [{
                                "message": {"role": "assistant", "content": " 3.5 "},
                                "finish_reason": "stop"
                            }],
                            "usage": {"prompt_tokens": 40, "completion_tokens": 2, "total_tokens": 42}
                        }))
                    },
                ),
            )
            .with_state(captured.clone());
        let provider = OpenAiChatProvider::new(config(serve(router).await)).unwrap();

        let resp = provider
            .complete(
                CompletionRequest::new(vec![ChatMessage::system("sys"), ChatMessage::user("job")])
                    .with_model("gpt-4.1-mini")
                    .with_temperature(0.2),
            )
            .await
            .unwrap();

        assert_eq!(resp.content, " 3.5 ");
        assert_eq!(resp.finish_reason, FinishReason::Stop);
        assert_eq!(resp.input_tokens, 40);

        let body = captured.body.lock().await.clone().unwrap();
        assert_eq!(body["model"], "gpt-4.1-mini");
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "job");
        assert_eq!(captured.auth.lock().await.as_deref(), Some("Bearer sk-test"));
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth_failed() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let provider = OpenAiChatProvider::new(config(serve(router).await)).unwrap();

        let err = provider
            .complete(CompletionRequest::new(vec![ChatMessage::user("job")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::AuthFailed { .. }));
    }

    #[tokio::test]
    async fn test_empty_choices_is_invalid_response() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(serde_json::json!({"id": "x", "choices": []})) }),
        );
        let provider = OpenAiChatProvider::new(config(serve(router).await)).unwrap();

        let err = provider
            .complete(CompletionRequest::new(vec![ChatMessage::user("job")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let mut cfg = config(serve(router).await);
        cfg.timeout = Duration::from_millis(100);
        let provider = OpenAiChatProvider::new(cfg).unwrap();

        let err = provider
            .complete(CompletionRequest::new(vec![ChatMessage::user("job")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Timeout { .. }));
    }
}
