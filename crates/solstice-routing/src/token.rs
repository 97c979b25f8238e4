//! Single-shot change tokens.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// A single-shot signal whose expiry tells routing consumers that the
/// endpoint set changed.
///
/// One token corresponds to one endpoint-snapshot generation. Once
/// tripped it stays tripped; consumers obtain a fresh token from the
/// registry and re-read the endpoint list.
#[derive(Clone)]
pub struct ChangeToken {
    inner: Arc<Signal>,
}

struct Signal {
    changed: AtomicBool,
    notify: Notify,
}

impl ChangeToken {
    /// A fresh, untripped token.
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Signal {
                changed: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Whether the token has already expired.
    pub fn has_changed(&self) -> bool {
        self.inner.changed.load(Ordering::Acquire)
    }

    /// Wait until the token expires. Returns immediately if it already
    /// has.
    pub async fn changed(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.has_changed() {
                return;
            }
            notified.await;
        }
    }

    /// Expire the token and wake every waiter.
    pub(crate) fn trip(&self) {
        self.inner.changed.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }
}

impl std::fmt::Debug for ChangeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeToken")
            .field("changed", &self.has_changed())
            .finish()
    }
}
