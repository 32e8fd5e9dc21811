use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Cooperative cancel flag for a single exchange.
///
/// Clones share the flag. The flag only ever goes from unset to set; the
/// exchange polls it between lines and also waits on it while a read is
/// pending, so a cancel does not have to wait for the next line to arrive.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag. Returns `true` only for the call that actually set it.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.flag.swap(true, Ordering::AcqRel);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// Resolves once the flag is set.
    pub async fn cancelled(&self) {
        loop {
            // Registered before the check so a concurrent `cancel` cannot slip between.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
