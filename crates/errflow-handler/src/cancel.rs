// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cancellation of in-flight error handling.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A cloneable token used to abort recovery routing.
///
/// All clones share state; cancelling one is observed by every clone.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: AtomicBool,
    reason: Mutex<Option<CancellationReason>>,
    notify: Notify,
}

impl CancellationToken {
    /// A token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                reason: Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// Cancel with [`CancellationReason::Requested`].
    pub fn cancel(&self) {
        self.cancel_with(CancellationReason::Requested);
    }

    /// Cancel, recording `reason` if this is the first cancellation.
    pub fn cancel_with(&self, reason: CancellationReason) {
        {
            let mut guard = self.inner.reason.lock().expect("reason lock poisoned");
            if guard.is_none() {
                *guard = Some(reason);
            }
        }
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// The first recorded reason.
    #[must_use]
    pub fn reason(&self) -> Option<CancellationReason> {
        *self.inner.reason.lock().expect("reason lock poisoned")
    }

    /// Resolves once the token is cancelled; immediately if it already is.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel is not missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

/// Why handling was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    /// The caller asked for it.
    Requested,
    /// The surrounding pipeline timed out.
    Timeout,
    /// The runtime is shutting down.
    Shutdown,
}

impl CancellationReason {
    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Requested => "cancelled by request",
            Self::Timeout => "cancelled due to timeout",
            Self::Shutdown => "cancelled because the runtime is shutting down",
        }
    }
}
