use std::pin::Pin;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures_core::Stream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use taskdeck_provider::{ChatRequest, LlmMessage, LlmProvider, StreamChunk};
use taskdeck_schema::{ChatMessage, Role, Task, TaskDraft};
use taskdeck_store::Store;

use crate::extract::{parse_extraction, TaskExtraction};

/// Messages of history sent to the model per request, newest last. Older
/// messages stay in the store but fall out of the prompt.
pub const CONTEXT_WINDOW: usize = 20;

/// Messages considered when summarizing a chat into a title.
const TITLE_CONTEXT_MESSAGES: usize = 6;

const MAX_TITLE_CHARS: usize = 50;

const SYSTEM_PROMPT: &str = "You are a task management assistant. Help the user plan, \
    organize and track their work. Be concise and concrete. When the user describes \
    something actionable, offer to capture it as a task.";

const TITLE_SYSTEM_PROMPT: &str = "Summarize the following conversation as a short title \
    of at most six words. Reply with the title only, no quotes, no punctuation at the end.";

const EXTRACT_SYSTEM_PROMPT: &str = "Extract a single actionable task from the user's \
    message. Reply with JSON only, no prose, using this shape: \
    {\"title\": string, \"description\": string|null, \"dueDate\": RFC 3339 string|null, \
    \"priority\": \"low\"|\"medium\"|\"high\"|\"urgent\"|null, \"tags\": [string], \
    \"confidence\": number between 0 and 1}. \
    If the message contains no actionable task, reply with {\"title\": null}.";

/// Conversational pipeline: persistence-backed chats with a model on the
/// other end. Every entry point is owner-checked against the store.
#[derive(Clone)]
pub struct ChatService {
    store: Store,
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl ChatService {
    pub fn new(store: Store, provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            store,
            provider,
            model: model.into(),
        }
    }

    /// One blocking exchange: persist the user message, ask the model with
    /// the windowed history, persist and return the reply. A provider
    /// failure surfaces to the caller; the user message stays persisted.
    pub async fn send_message(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        text: &str,
    ) -> Result<ChatMessage> {
        let chat = self
            .store
            .get_chat(chat_id, user_id)
            .await?
            .ok_or_else(|| anyhow!("chat {chat_id} not found"))?;

        let user_message = ChatMessage::user(text);
        self.store
            .append_chat_message(chat_id, user_message.clone())
            .await?;

        let mut history = chat.messages;
        history.push(user_message);
        let request = ChatRequest::new(self.model.as_str(), build_context(&history));
        let response = self.provider.chat(request).await?;

        let assistant = ChatMessage::assistant(response.text);
        self.store
            .append_chat_message(chat_id, assistant.clone())
            .await?;
        Ok(assistant)
    }

    /// Streaming exchange. Deltas are forwarded as they arrive; the
    /// accumulated reply is written to the store only when the terminal
    /// chunk comes through, so a stream that dies mid-way leaves no
    /// assistant message behind.
    pub async fn stream_message(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        text: &str,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>> {
        let chat = self
            .store
            .get_chat(chat_id, user_id)
            .await?
            .ok_or_else(|| anyhow!("chat {chat_id} not found"))?;

        let user_message = ChatMessage::user(text);
        self.store
            .append_chat_message(chat_id, user_message.clone())
            .await?;

        let mut history = chat.messages;
        history.push(user_message);
        let request = ChatRequest::new(self.model.as_str(), build_context(&history));
        let mut inner = self.provider.stream(request).await?;

        let store = self.store.clone();
        let stream = async_stream::try_stream! {
            let mut full = String::new();
            while let Some(chunk) = inner.next().await {
                let chunk = chunk?;
                if chunk.is_final {
                    store
                        .append_chat_message(chat_id, ChatMessage::assistant(full.clone()))
                        .await?;
                    yield chunk;
                    break;
                }
                full.push_str(&chunk.delta);
                yield chunk;
            }
        };
        Ok(Box::pin(stream))
    }

    /// Summarize the opening of a chat into a stored title of at most 50
    /// characters. Falls back to the first user message when the model is
    /// unreachable; the chat keeps working either way.
    pub async fn summarize_title(&self, chat_id: Uuid, user_id: Uuid) -> Result<String> {
        let chat = self
            .store
            .get_chat(chat_id, user_id)
            .await?
            .ok_or_else(|| anyhow!("chat {chat_id} not found"))?;
        if chat.messages.is_empty() {
            anyhow::bail!("chat {chat_id} has no messages to summarize");
        }

        let transcript = chat
            .messages
            .iter()
            .take(TITLE_CONTEXT_MESSAGES)
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let request = ChatRequest::simple(self.model.as_str(), Some(TITLE_SYSTEM_PROMPT), &transcript)
            .with_max_tokens(32);
        let title = match self.provider.chat(request).await {
            Ok(response) => clamp_title(&response.text),
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "title summarization failed, using first message");
                let first_user = chat
                    .messages
                    .iter()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or("New chat");
                clamp_title(first_user)
            }
        };

        self.store.set_chat_title(chat_id, &title).await?;
        Ok(title)
    }

    /// Ask the model to turn free text into a task draft. A reply the model
    /// got wrong comes back as `success = false`, never as an error.
    pub async fn extract_task(&self, text: &str) -> Result<TaskExtraction> {
        let request = ChatRequest::simple(self.model.as_str(), Some(EXTRACT_SYSTEM_PROMPT), text)
            .with_temperature(0.2);
        let response = self.provider.chat(request).await?;
        Ok(parse_extraction(&response.text))
    }

    /// Turn a confirmed draft into a real task. The confirming user is both
    /// creator and assignee.
    pub async fn confirm_task_draft(&self, user_id: Uuid, draft: TaskDraft) -> Result<Task> {
        let mut task = Task::new(draft.title, user_id).with_assignee(user_id);
        if let Some(description) = draft.description {
            task.description = description;
        }
        if let Some(due_at) = draft.due_at {
            task = task.with_due_at(due_at);
        }
        if let Some(priority) = draft.priority {
            task = task.with_priority(priority);
        }
        task.tags = draft.tags;

        self.store.insert_task(task.clone()).await?;
        Ok(task)
    }
}

/// System prompt plus the trailing window of history, oldest first.
pub fn build_context(messages: &[ChatMessage]) -> Vec<LlmMessage> {
    let start = messages.len().saturating_sub(CONTEXT_WINDOW);
    let mut context = Vec::with_capacity(messages.len() - start + 1);
    context.push(LlmMessage::system(SYSTEM_PROMPT));
    for message in &messages[start..] {
        context.push(match message.role {
            Role::System => LlmMessage::system(message.content.clone()),
            Role::User => LlmMessage::user(message.content.clone()),
            Role::Assistant => LlmMessage::assistant(message.content.clone()),
        });
    }
    context
}

/// First line, no wrapping quotes, at most 50 characters with a trailing
/// ellipsis when cut.
fn clamp_title(raw: &str) -> String {
    let first_line = raw.trim().lines().next().unwrap_or("").trim();
    let cleaned = first_line.trim_matches(|c| c == '"' || c == '\'').trim();
    if cleaned.is_empty() {
        return "New chat".to_string();
    }
    if cleaned.chars().count() <= MAX_TITLE_CHARS {
        return cleaned.to_string();
    }
    let mut title: String = cleaned.chars().take(MAX_TITLE_CHARS - 1).collect();
    title.push('…');
    title
}
