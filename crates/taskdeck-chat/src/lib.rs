//! Conversational assistant pipeline.
//!
//! Chats live in the store; each exchange sends the trailing window of
//! history to the model. Streaming replies are persisted only once the
//! terminal chunk arrives. Free text can be turned into task drafts and
//! confirmed drafts into real tasks.

mod extract;
mod service;

pub use extract::{parse_extraction, TaskExtraction};
pub use service::{build_context, ChatService, CONTEXT_WINDOW};
