//! Client for a local Ollama server: model listing, reachability probe and
//! streaming chat over `/api/chat`.

pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod exchange;
pub mod wire;

pub use client::OllamaClient;
pub use config::OllamaConfig;
pub use exchange::ChatExchange;
