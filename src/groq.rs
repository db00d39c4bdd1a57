use crate::config::{ApiKey, Config};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum GroqError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("API error: HTTP {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("Model returned no choices")]
    EmptyResponse,
    #[error("Maximum retries exceeded, last error: {0}")]
    MaxRetriesExceeded(String),
}

impl GroqError {
    /// Transport failures, rate limits and server errors are worth another attempt.
    fn is_transient(&self) -> bool {
        match self {
            GroqError::Http(_) => true,
            GroqError::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// A user turn carrying a prompt and one image as a data URL.
    pub fn user_with_image(text: impl Into<String>, data_url: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: data_url.into(),
                    },
                },
            ]),
        }
    }

    /// Copy with image payloads replaced, for logging.
    fn redacted(&self) -> Self {
        let content = match &self.content {
            MessageContent::Text(text) => MessageContent::Text(text.clone()),
            MessageContent::Parts(parts) => MessageContent::Parts(
                parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text { text } => ContentPart::Text { text: text.clone() },
                        ContentPart::ImageUrl { image_url } => ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: format!("<image data, {} chars>", image_url.url.len()),
                            },
                        },
                    })
                    .collect(),
            ),
        };

        Self {
            role: self.role,
            content,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for Groq's OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct GroqClient {
    client: Client,
    api_url: String,
    api_key: ApiKey,
    model: String,
    max_retries: u32,
    initial_backoff: Duration,
}

impl GroqClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: ApiKey,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GroqError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key,
            model: model.into(),
            max_retries: 3,
            initial_backoff: Duration::from_millis(1000),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, GroqError> {
        Ok(Self::new(
            config.groq_api_url.clone(),
            config.groq_api_key.clone(),
            config.groq_model.clone(),
            config.request_timeout(),
        )?
        .with_max_retries(config.max_retries))
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends the conversation and returns the first choice's text.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, GroqError> {
        let mut attempt = 0;
        let mut delay = self.initial_backoff;

        loop {
            attempt += 1;
            match self.send(request).await {
                Ok(content) => return Ok(content),
                Err(e) if !e.is_transient() => {
                    error!("Groq call failed permanently: {}", e);
                    return Err(e);
                }
                Err(e) if attempt >= self.max_retries => {
                    error!("Max retries exceeded for Groq call: {}", e);
                    return Err(GroqError::MaxRetriesExceeded(e.to_string()));
                }
                Err(e) => {
                    warn!(
                        "Groq call failed (attempt {}): {}. Retrying in {:?}",
                        attempt, e, delay
                    );
                    sleep(delay).await;
                    delay = std::cmp::min(delay * 2, Duration::from_secs(30));
                }
            }
        }
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String, GroqError> {
        let body = ChatCompletionBody {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        if tracing::enabled!(tracing::Level::DEBUG) {
            let redacted: Vec<ChatMessage> =
                request.messages.iter().map(ChatMessage::redacted).collect();
            let preview = ChatCompletionBody {
                messages: &redacted,
                ..body
            };
            debug!(
                "Sending request to {}: {}",
                self.api_url,
                serde_json::to_string(&preview)?
            );
        }

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GroqError::Api { status, body });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GroqError::EmptyResponse)?;

        debug!("Groq response received: {} chars", content.len());
        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_with_image_serialization() {
        let message = ChatMessage::user_with_image("Assess this scalp", "data:image/png;base64,AAAA");

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": "Assess this scalp" },
                    { "type": "image_url", "image_url": { "url": "data:image/png;base64,AAAA" } }
                ]
            })
        );
    }

    #[test]
    fn test_text_message_serialization() {
        let value = serde_json::to_value(ChatMessage::system("You are Doc Bot")).unwrap();
        assert_eq!(value, json!({ "role": "system", "content": "You are Doc Bot" }));
    }

    #[test]
    fn test_redacted_hides_image_payload() {
        let message = ChatMessage::user_with_image("prompt", "data:image/jpeg;base64,SECRET");
        let printed = serde_json::to_string(&message.redacted()).unwrap();

        assert!(!printed.contains("SECRET"));
        assert!(printed.contains("<image data, 29 chars>"));
    }

    #[test]
    fn test_body_omits_unset_options() {
        let messages = vec![ChatMessage::user("hi")];
        let body = ChatCompletionBody {
            model: "m",
            messages: &messages,
            max_tokens: None,
            temperature: Some(0.3),
        };

        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("max_tokens").is_none());
        assert!((value["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_transient_classification() {
        let rate_limited = GroqError::Api {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
        };
        let unavailable = GroqError::Api {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        let unauthorized = GroqError::Api {
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
        };

        assert!(rate_limited.is_transient());
        assert!(unavailable.is_transient());
        assert!(!unauthorized.is_transient());
        assert!(!GroqError::EmptyResponse.is_transient());
    }

    #[test]
    fn test_builder_options() {
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")])
            .max_tokens(400)
            .temperature(0.7);

        assert_eq!(request.max_tokens, Some(400));
        assert_eq!(request.temperature, Some(0.7));

        let client = GroqClient::new(
            "http://localhost:8080",
            ApiKey::new("gsk_test"),
            "meta-llama/llama-4-scout-17b-16e-instruct",
            Duration::from_secs(5),
        )
        .unwrap()
        .with_max_retries(0);
        assert_eq!(client.max_retries, 1);
    }

    // Round trips against a live endpoint are covered by tests/groq_client_tests.rs
    // with an in-process mock server.
}
