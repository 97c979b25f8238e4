//! Per-key coalescing of bursty filesystem events.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::path::CanonicalKey;

/// A pending reload slot: the cancellation token plus a generation tag
/// so a task can tell whether the map entry is still its own.
struct PendingSlot {
    generation: u64,
    token: CancellationToken,
}

/// Coalesces event bursts per canonical path.
///
/// `schedule` arms a timer of the configured window. A later `schedule`
/// for the same key cancels and replaces the earlier pending action;
/// when the window elapses without replacement, the action runs exactly
/// once. Each task owns its own token: a successor only *cancels* the
/// token it displaced, and a task removes itself from the map only if
/// the entry is still its own, so it can never delete a successor's
/// slot.
pub struct Debouncer {
    window: Duration,
    pending: Arc<DashMap<CanonicalKey, PendingSlot>>,
    generations: AtomicU64,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Arc::new(DashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    /// Arm (or re-arm) the pending action for a key. Must be called from
    /// within a Tokio runtime.
    pub fn schedule<F>(&self, key: CanonicalKey, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let displaced = self.pending.insert(
            key.clone(),
            PendingSlot {
                generation,
                token: token.clone(),
            },
        );
        if let Some(slot) = displaced {
            slot.token.cancel();
        }

        let pending = Arc::clone(&self.pending);
        let window = self.window;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    // Replaced; the successor owns the map entry now.
                }
                _ = tokio::time::sleep(window) => {
                    let still_current = pending
                        .remove_if(&key, |_, slot| slot.generation == generation)
                        .is_some();

                    if still_current {
                        // Failures inside the action must not take the
                        // debouncer down; run it as its own task and log
                        // panics.
                        if let Err(error) = tokio::spawn(action).await {
                            tracing::error!(key = %key, %error, "debounced action failed");
                        }
                    }
                }
            }
        });
    }

    /// Number of keys with an uncancelled pending action.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Cancel everything; used at shutdown.
    pub fn clear(&self) {
        self.pending.retain(|_, slot| {
            slot.token.cancel();
            false
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    fn key(name: &str) -> CanonicalKey {
        CanonicalKey::for_path(Path::new(name))
    }

    #[tokio::test]
    async fn a_burst_collapses_to_one_run() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let runs = Arc::clone(&runs);
            debouncer.schedule(key("/tmp/a.so"), async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let debouncer = Debouncer::new(Duration::from_millis(30));
        let runs = Arc::new(AtomicUsize::new(0));

        for name in ["/tmp/a.so", "/tmp/b.so", "/tmp/c.so"] {
            let runs = Arc::clone(&runs);
            debouncer.schedule(key(name), async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn at_most_one_pending_action_per_key() {
        let debouncer = Debouncer::new(Duration::from_millis(100));

        debouncer.schedule(key("/tmp/a.so"), async {});
        debouncer.schedule(key("/tmp/a.so"), async {});
        debouncer.schedule(key("/tmp/a.so"), async {});

        assert_eq!(debouncer.pending_count(), 1);
    }

    #[tokio::test]
    async fn a_panicking_action_does_not_kill_the_debouncer() {
        let debouncer = Debouncer::new(Duration::from_millis(20));
        let runs = Arc::new(AtomicUsize::new(0));

        debouncer.schedule(key("/tmp/a.so"), async {
            panic!("plugin action exploded");
        });
        tokio::time::sleep(Duration::from_millis(80)).await;

        let counted = Arc::clone(&runs);
        debouncer.schedule(key("/tmp/a.so"), async move {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_cancels_pending_actions() {
        let debouncer = Debouncer::new(Duration::from_millis(40));
        let runs = Arc::new(AtomicUsize::new(0));

        let counted = Arc::clone(&runs);
        debouncer.schedule(key("/tmp/a.so"), async move {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.clear();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(debouncer.pending_count(), 0);
    }
}
