pub mod openai;
pub mod types;

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures_core::Stream;
use tokio_stream::iter as stream_iter;

pub use openai::{OpenAiProvider, ProviderError, ProviderErrorKind, RetryPolicy};
pub use types::{ChatRequest, ChatResponse, LlmMessage, StreamChunk};

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    async fn stream(
        &self,
        _request: ChatRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>> {
        anyhow::bail!("streaming not supported by this provider")
    }
}

/// Echo provider for tests: replies with a tagged copy of the last user
/// message, word by word when streaming.
pub struct StubProvider;

#[async_trait]
impl LlmProvider for StubProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let user_text = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(ChatResponse {
            text: format!("[stub:{}] {}", request.model, user_text),
            input_tokens: Some(10),
            output_tokens: Some(20),
            finish_reason: Some("stop".into()),
        })
    }

    async fn stream(
        &self,
        request: ChatRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>> {
        let user_text = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let full_text = format!("[stub:{}] {}", request.model, user_text);

        let mut chunks: Vec<Result<StreamChunk>> = full_text
            .split_whitespace()
            .map(|word| Ok(StreamChunk::delta(format!("{word} "))))
            .collect();
        chunks.push(Ok(StreamChunk::done(Some("stop".into()))));

        Ok(Box::pin(stream_iter(chunks)))
    }
}
