use std::pin::Pin;

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ExchangeHandle, ModelDescriptor, OllamaError};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One entry of a conversation.
///
/// Fields are read-only after construction. Only assistant messages produced
/// by a finished exchange carry a generation duration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generation_duration_ms: Option<u64>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), None)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content.into(), None)
    }

    /// A prior assistant turn replayed as history.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), None)
    }

    /// The assistant message a completed exchange resolves to.
    pub fn generated(content: impl Into<String>, generation_duration_ms: u64) -> Self {
        Self::new(Role::Assistant, content.into(), Some(generation_duration_ms))
    }

    fn new(role: Role, content: String, generation_duration_ms: Option<u64>) -> Self {
        Self {
            role,
            content,
            created_at: Utc::now(),
            generation_duration_ms,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn generation_duration_ms(&self) -> Option<u64> {
        self.generation_duration_ms
    }
}

/// One decoded record of a streaming chat response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatDelta {
    Text(String),
    Done,
}

pub type ChatStream<'a> = Pin<Box<dyn Stream<Item = Result<ChatDelta, OllamaError>> + Send + 'a>>;

#[allow(async_fn_in_trait)]
pub trait ModelClient: Send + Sync {
    /// Models installed on the server, sorted by name.
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, OllamaError>;

    /// Never fails: unreachable, timed out and non-success all map to `false`.
    async fn check_connection(&self) -> bool;

    /// Starts one exchange in the background. `on_token` sees each fragment
    /// in arrival order and is not called once the exchange has resolved.
    fn send_chat<F>(&self, model: &str, history: &[Message], on_token: F) -> ExchangeHandle
    where
        F: FnMut(&str) + Send + 'static;

    /// Lower level: opens the chat request and hands back the decoded records.
    async fn stream_chat<'a>(
        &'a self,
        model: &str,
        history: &[Message],
    ) -> Result<ChatStream<'a>, OllamaError>;
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message cannot be empty or contain only whitespace")]
    Blank,
}

/// Gate applied by front ends before a prompt becomes a user message.
pub fn validate_prompt(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::Blank);
    }
    Ok(())
}
