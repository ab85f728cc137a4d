//! Chat-completion style generation client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::backend::GenerationBackend;
use crate::error::{truncate_body, ClientError};

/// Role of a message in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One typed entry of a multi-part message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    /// A text entry.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// An image entry; `url` may be a data URL.
    pub fn image(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

/// Image locator wrapper used by the wire format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Message content: plain text or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A role-tagged message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    /// A system instruction.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    /// A user message made of parts.
    pub fn user(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }
}

/// Request body for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Client for a chat-completion style generation endpoint.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    inner: reqwest::Client,
    api_url: String,
    api_key: String,
    timeout: Duration,
}

impl GenerationClient {
    /// Create a new generation client.
    ///
    /// `timeout` bounds one whole call; image generation is slow, so this is
    /// usually several minutes.
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            inner: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl GenerationBackend for GenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ClientError> {
        info!(
            url = %self.api_url,
            model = %request.model,
            messages = request.messages.len(),
            "Sending generation request"
        );

        let response = self
            .inner
            .post(&self.api_url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "Generation response received");

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: truncate_body(&body, 512),
            });
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| ClientError::Decode(format!("invalid JSON: {}", e)))?;
        parse_generation_response(&value)
    }
}

/// Pull the generated text out of a response body.
///
/// A top-level `error` wins over any content. Content may be a string or a
/// list of parts; text parts are concatenated and image parts contribute
/// their URL on a line of its own.
pub fn parse_generation_response(value: &Value) -> Result<String, ClientError> {
    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ClientError::Provider(message));
    }

    let content = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .ok_or_else(|| ClientError::Decode("response has no choices[0].message.content".to_string()))?;

    match content {
        Value::String(text) => Ok(text.clone()),
        Value::Array(parts) => {
            let mut out = String::new();
            for part in parts {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    out.push_str(text);
                } else if let Some(url) = part
                    .get("image_url")
                    .and_then(|i| i.get("url").or(Some(i)))
                    .and_then(Value::as_str)
                {
                    out.push('\n');
                    out.push_str(url);
                    out.push('\n');
                }
            }
            Ok(out)
        }
        Value::Null => Ok(String::new()),
        other => Err(ClientError::Decode(format!("unsupported content: {}", other))),
    }
}
