//! Transport-independent types shared by the Ollama client and its callers.

pub mod cancel;
pub mod error;
pub mod exchange;
pub mod llm;
pub mod model;

pub use cancel::CancelToken;
pub use error::{ErrorKind, OllamaError};
pub use exchange::{ExchangeHandle, ExchangeResult, ExchangeState};
pub use llm::{ChatDelta, ChatStream, Message, ModelClient, Role};
pub use model::ModelDescriptor;
