//! JSON shapes exchanged with the server.

use olama_core::{Message, ModelDescriptor, Role};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat`.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

/// Maps history to the wire shape. Timestamps and durations stay local.
pub fn build_chat_request(model: &str, history: &[Message]) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: history
            .iter()
            .map(|m| WireMessage {
                role: m.role(),
                content: m.content().to_string(),
            })
            .collect(),
        stream: true,
    }
}

/// Body of `GET /api/tags`.
#[derive(Debug, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<RawModel>,
}

#[derive(Debug, Deserialize)]
pub struct RawModel {
    pub name: String,
    pub size: u64,
    pub modified_at: String,
}

impl From<RawModel> for ModelDescriptor {
    fn from(raw: RawModel) -> Self {
        ModelDescriptor::new(raw.name, raw.size, raw.modified_at)
    }
}

/// One NDJSON line of a streaming chat response.
#[derive(Debug, Deserialize)]
pub struct ChatChunk {
    pub message: Option<ChunkMessage>,
    #[serde(default)]
    pub done: bool,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkMessage {
    pub content: String,
}
