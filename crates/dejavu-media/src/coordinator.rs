//! Process-wide sweep latch.
//!
//! At most one backfill or reindex sweep runs at a time, and live ingestion
//! stays suspended while one does. Holding a [`SweepGuard`] is the only way
//! to be "sweeping"; dropping it releases the latch even on early return.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

/// Gate shared by ingestion and backfill.
#[derive(Clone)]
pub struct SweepCoordinator {
    state: Arc<watch::Sender<bool>>,
}

impl Default for SweepCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepCoordinator {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Claim the latch, or `None` when a sweep is already running.
    pub fn try_begin(&self) -> Option<SweepGuard> {
        let claimed = self.state.send_if_modified(|sweeping| {
            if *sweeping {
                false
            } else {
                *sweeping = true;
                true
            }
        });
        if !claimed {
            debug!(
                subsystem = "media",
                component = "coordinator",
                "Sweep already running"
            );
            return None;
        }
        info!(
            subsystem = "media",
            component = "coordinator",
            op = "begin",
            "Sweep started, ingestion suspended"
        );
        Some(SweepGuard {
            state: self.state.clone(),
        })
    }

    /// Whether a sweep currently holds the latch.
    pub fn is_sweeping(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolve once no sweep is running.
    pub async fn wait_until_idle(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in self, so the channel cannot close here.
        let _ = rx.wait_for(|sweeping| !*sweeping).await;
    }
}

/// Proof that the caller holds the sweep latch.
pub struct SweepGuard {
    state: Arc<watch::Sender<bool>>,
}

impl Drop for SweepGuard {
    fn drop(&mut self) {
        self.state.send_replace(false);
        info!(
            subsystem = "media",
            component = "coordinator",
            op = "end",
            "Sweep finished, ingestion resumed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_only_one_guard_at_a_time() {
        let coordinator = SweepCoordinator::new();
        assert!(!coordinator.is_sweeping());

        let guard = coordinator.try_begin().expect("first claim succeeds");
        assert!(coordinator.is_sweeping());
        assert!(coordinator.try_begin().is_none());

        drop(guard);
        assert!(!coordinator.is_sweeping());
        assert!(coordinator.try_begin().is_some());
    }

    #[test]
    fn test_clones_share_the_latch() {
        let a = SweepCoordinator::new();
        let b = a.clone();
        let _guard = a.try_begin().unwrap();
        assert!(b.is_sweeping());
        assert!(b.try_begin().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_idle_resolves_on_release() {
        let coordinator = SweepCoordinator::new();
        let guard = coordinator.try_begin().unwrap();

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.wait_until_idle().await })
        };

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter released")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_until_idle_returns_immediately_when_idle() {
        SweepCoordinator::new().wait_until_idle().await;
    }
}
