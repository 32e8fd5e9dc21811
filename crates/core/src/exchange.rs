use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::{CancelToken, Message, OllamaError};

/// Lifecycle of one chat exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Sending,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl ExchangeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExchangeState::Completed | ExchangeState::Cancelled | ExchangeState::Failed
        )
    }

    pub fn can_advance_to(self, next: ExchangeState) -> bool {
        use ExchangeState::*;
        matches!(
            (self, next),
            (Idle, Sending)
                | (Sending, Streaming)
                | (Sending, Failed)
                | (Sending, Cancelled)
                | (Streaming, Completed)
                | (Streaming, Failed)
                | (Streaming, Cancelled)
        )
    }
}

/// How an exchange ended.
///
/// `Cancelled` carries nothing: fragments delivered before the cancel already
/// belong to the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum ExchangeResult {
    Completed(Message),
    Cancelled,
    Failed(OllamaError),
}

impl ExchangeResult {
    pub fn state(&self) -> ExchangeState {
        match self {
            ExchangeResult::Completed(_) => ExchangeState::Completed,
            ExchangeResult::Cancelled => ExchangeState::Cancelled,
            ExchangeResult::Failed(_) => ExchangeState::Failed,
        }
    }

    pub fn into_result(self) -> Result<Option<Message>, OllamaError> {
        match self {
            ExchangeResult::Completed(m) => Ok(Some(m)),
            ExchangeResult::Cancelled => Ok(None),
            ExchangeResult::Failed(e) => Err(e),
        }
    }
}

/// Caller side of a background exchange. Await it for the result.
#[derive(Debug)]
pub struct ExchangeHandle {
    cancel: CancelToken,
    task: JoinHandle<ExchangeResult>,
}

impl ExchangeHandle {
    pub fn new(cancel: CancelToken, task: JoinHandle<ExchangeResult>) -> Self {
        Self { cancel, task }
    }

    /// Requests cancellation. Inert once the exchange has resolved.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Future for ExchangeHandle {
    type Output = ExchangeResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.task).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) => ExchangeResult::Failed(OllamaError::unexpected(e)),
        })
    }
}
