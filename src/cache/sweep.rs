//! Optional background sweep of expired entries
//!
//! Expiry is normally enforced lazily on read. A sweep bounds storage growth
//! for keys that are never read again.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::CacheHelper;

/// Handle for a running sweep task
pub struct SweepHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<usize>,
}

impl SweepHandle {
    /// Spawns a task that sweeps `cache` every `interval`
    ///
    /// The first sweep happens one full interval after spawning. Failed sweeps
    /// are logged and retried on the next tick.
    pub fn spawn(cache: CacheHelper, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Skip the first tick (immediate)
            ticker.tick().await;
            let mut total = 0;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match cache.sweep().await {
                            Ok(removed) => {
                                total += removed;
                                tracing::debug!(removed, "Swept expired cache entries");
                            }
                            Err(e) => tracing::warn!(error = %e, "Cache sweep failed"),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            total
        });

        Self { shutdown_tx, task }
    }

    /// Stops the sweep task and returns how many entries it removed in total
    ///
    /// A task that panicked or was cancelled is logged and counts as zero.
    pub async fn shutdown(self) -> usize {
        let _ = self.shutdown_tx.send(()).await;
        match self.task.await {
            Ok(total) => total,
            Err(e) => {
                tracing::warn!(error = %e, panicked = e.is_panic(), "Cache sweep task failed");
                0
            }
        }
    }
}
