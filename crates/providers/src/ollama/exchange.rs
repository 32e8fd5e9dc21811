//! One chat exchange, driven through `Idle -> Sending -> Streaming` to a
//! terminal state.

use std::time::{Duration, Instant};

use futures::StreamExt;
use olama_core::{
    CancelToken, ChatDelta, ExchangeResult, ExchangeState, Message, OllamaError,
};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::ollama::client::open_chat_stream;
use crate::ollama::wire::ChatRequest;

pub struct ChatExchange {
    http: Client,
    base_url: String,
    request: ChatRequest,
    timeout: Duration,
    cancel: CancelToken,
    state: ExchangeState,
}

impl ChatExchange {
    pub fn new(http: Client, base_url: &str, request: ChatRequest, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            request,
            timeout,
            cancel: CancelToken::new(),
            state: ExchangeState::Idle,
        }
    }

    /// The token is owned by this exchange; clones only let others set it.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Runs the exchange to completion on the current task.
    ///
    /// `on_token` only fires while streaming, once per fragment, in order.
    pub async fn run<F>(&mut self, mut on_token: F) -> ExchangeResult
    where
        F: FnMut(&str),
    {
        if self.state != ExchangeState::Idle {
            return ExchangeResult::Failed(OllamaError::unexpected(format!(
                "exchange already in state {:?}",
                self.state
            )));
        }
        let started = Instant::now();
        let cancel = self.cancel.clone();
        self.advance(ExchangeState::Sending);
        info!(target:"providers::ollama","start chat exchange model={} messages={}", self.request.model, self.request.messages.len());

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            r = open_chat_stream(&self.http, &self.base_url, &self.request, self.timeout) => Some(r),
        };
        let mut stream = match opened {
            None => return self.finish(ExchangeResult::Cancelled),
            Some(Err(e)) => return self.finish(ExchangeResult::Failed(e)),
            Some(Ok(s)) => s,
        };

        let mut content = String::new();
        loop {
            if cancel.is_cancelled() {
                return self.finish(ExchangeResult::Cancelled);
            }
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = stream.next() => Some(item),
            };
            let Some(item) = item else {
                return self.finish(ExchangeResult::Cancelled);
            };
            match item {
                Some(Ok(delta)) => {
                    if self.state == ExchangeState::Sending {
                        self.advance(ExchangeState::Streaming);
                    }
                    match delta {
                        ChatDelta::Text(t) => {
                            on_token(&t);
                            content.push_str(&t);
                        }
                        ChatDelta::Done => {
                            let elapsed = started.elapsed().as_millis() as u64;
                            return self.finish(ExchangeResult::Completed(Message::generated(
                                content, elapsed,
                            )));
                        }
                    }
                }
                Some(Err(e)) => return self.finish(ExchangeResult::Failed(e)),
                None => {
                    return self.finish(ExchangeResult::Failed(
                        OllamaError::parse("Failed to parse streaming response")
                            .with_cause("stream ended before completion"),
                    ))
                }
            }
        }
    }

    fn advance(&mut self, next: ExchangeState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal exchange transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(target:"providers::ollama","exchange {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn finish(&mut self, result: ExchangeResult) -> ExchangeResult {
        self.advance(result.state());
        match &result {
            ExchangeResult::Completed(m) => {
                info!(target:"providers::ollama","chat exchange completed chars={} ms={:?}", m.content().len(), m.generation_duration_ms())
            }
            ExchangeResult::Cancelled => info!(target:"providers::ollama","chat exchange cancelled"),
            ExchangeResult::Failed(e) => {
                warn!(target:"providers::ollama","chat exchange failed kind={} detail={} cause={:?}", e.kind, e.detail, e.cause)
            }
        }
        result
    }
}
