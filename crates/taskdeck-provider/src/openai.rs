use std::pin::Pin;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_core::Stream;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_stream::StreamExt;

use crate::{ChatRequest, ChatResponse, LlmProvider, StreamChunk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    RateLimit,
    ServerError,
    Timeout,
    Connect,
    AuthError,
    InvalidRequest,
    Unknown,
}

impl ProviderErrorKind {
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            429 => Self::RateLimit,
            401 | 403 => Self::AuthError,
            400 | 404 | 422 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Rate limits, 5xx and transport-level failures are worth retrying;
    /// every other class propagates immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::ServerError | Self::Timeout | Self::Connect
        )
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("model api error ({status}): {message}")]
    Api {
        status: StatusCode,
        kind: ProviderErrorKind,
        message: String,
    },
    #[error("model api transport error ({kind:?}): {message}")]
    Transport {
        kind: ProviderErrorKind,
        message: String,
    },
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Api { kind, .. } | Self::Transport { kind, .. } => *kind,
        }
    }

    fn from_reqwest(e: &reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            ProviderErrorKind::Timeout
        } else if e.is_connect() {
            ProviderErrorKind::Connect
        } else {
            ProviderErrorKind::Unknown
        };
        Self::Transport {
            kind,
            message: e.to_string(),
        }
    }
}

/// Retry ceiling and backoff base for the non-streaming path. Attempt `n`
/// sleeps `base_delay * 2^(n-1)` before the next try.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    retry: RetryPolicy,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn to_api_request(request: &ChatRequest, stream: bool) -> ApiRequest {
        ApiRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.clone(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stream,
        }
    }

    async fn post_once(&self, payload: &ApiRequest) -> std::result::Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.api_base);
        let resp = self
            .client
            .post(url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(ProviderError::Api {
                status,
                kind: ProviderErrorKind::from_status(status),
                message,
            });
        }
        Ok(resp)
    }

    /// One request with the configured retry loop around it. Only the
    /// retryable classes loop; everything else surfaces on first failure.
    async fn post_with_retry(&self, payload: &ApiRequest) -> std::result::Result<reqwest::Response, ProviderError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.post_once(payload).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < self.retry.max_attempts && e.kind().is_retryable() => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "model call failed, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload = Self::to_api_request(&request, false);
        let resp = self.post_with_retry(&payload).await?;
        let body: ApiResponse = resp.json().await?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("model response contained no choices"))?;

        Ok(ChatResponse {
            text: choice.message.map(|m| m.content).unwrap_or_default(),
            input_tokens: body.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: body.usage.as_ref().map(|u| u.completion_tokens),
            finish_reason: choice.finish_reason,
        })
    }

    /// Streaming requests are sent once; a stream that breaks mid-flight is
    /// surfaced to the consumer, never replayed.
    async fn stream(
        &self,
        request: ChatRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>> {
        let payload = Self::to_api_request(&request, true);
        let resp = self.post_once(&payload).await?;
        Ok(Box::pin(parse_sse_stream(resp.bytes_stream())))
    }
}

fn parse_sse_stream(
    byte_stream: impl Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> impl Stream<Item = Result<StreamChunk>> + Send {
    async_stream::stream! {
        tokio::pin!(byte_stream);
        let mut buffer = String::new();
        let mut finish_reason: Option<String> = None;

        while let Some(chunk_result) = byte_stream.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));

                    while let Some(pos) = buffer.find("\n\n") {
                        let event_text = buffer[..pos].to_string();
                        buffer = buffer[pos + 2..].to_string();

                        for line in event_text.lines() {
                            let Some(data) = line.strip_prefix("data: ") else {
                                continue;
                            };

                            if data.trim() == "[DONE]" {
                                yield Ok(StreamChunk::done(finish_reason.take()));
                                return;
                            }

                            match serde_json::from_str::<serde_json::Value>(data) {
                                Ok(event) => {
                                    if let Some(reason) = event
                                        .get("choices")
                                        .and_then(|c| c.get(0))
                                        .and_then(|c| c.get("finish_reason"))
                                        .and_then(|r| r.as_str())
                                    {
                                        finish_reason = Some(reason.to_string());
                                    }
                                    if let Some(content) = event
                                        .get("choices")
                                        .and_then(|c| c.get(0))
                                        .and_then(|c| c.get("delta"))
                                        .and_then(|d| d.get("content"))
                                        .and_then(|t| t.as_str())
                                    {
                                        if !content.is_empty() {
                                            yield Ok(StreamChunk::delta(content));
                                        }
                                    }
                                }
                                Err(e) => {
                                    yield Err(anyhow!("invalid sse event payload: {e}"));
                                    return;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(anyhow!("stream error: {e}"));
                    return;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiResponse {
    pub choices: Vec<ApiChoice>,
    pub usage: Option<ApiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiChoice {
    pub message: Option<ApiMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_classification() {
        assert_eq!(
            ProviderErrorKind::from_status(StatusCode::TOO_MANY_REQUESTS),
            ProviderErrorKind::RateLimit
        );
        assert_eq!(
            ProviderErrorKind::from_status(StatusCode::INTERNAL_SERVER_ERROR),
            ProviderErrorKind::ServerError
        );
        assert_eq!(
            ProviderErrorKind::from_status(StatusCode::BAD_REQUEST),
            ProviderErrorKind::InvalidRequest
        );
        assert!(ProviderErrorKind::RateLimit.is_retryable());
        assert!(ProviderErrorKind::ServerError.is_retryable());
        assert!(!ProviderErrorKind::InvalidRequest.is_retryable());
        assert!(!ProviderErrorKind::AuthError.is_retryable());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn api_request_serialization_matches_wire_shape() {
        let req = ChatRequest::simple("gpt-4o", Some("be helpful"), "hi")
            .with_max_tokens(128)
            .with_temperature(0.5);
        let api_req = OpenAiProvider::to_api_request(&req, false);

        let value = serde_json::to_value(api_req).unwrap();
        let expected = serde_json::json!({
            "model": "gpt-4o",
            "messages": [
                { "role": "system", "content": "be helpful" },
                { "role": "user", "content": "hi" }
            ],
            "max_tokens": 128,
            "temperature": 0.5
        });
        assert_eq!(value, expected);
    }

    #[test]
    fn streaming_request_carries_stream_flag() {
        let req = ChatRequest::simple("gpt-4o", None, "hi");
        let api_req = OpenAiProvider::to_api_request(&req, true);
        let value = serde_json::to_value(api_req).unwrap();
        assert_eq!(value["stream"], serde_json::json!(true));
    }
}
