//! Periodic removal of old terminal records.
//!
//! Retention is opt-in. Without a sweeper, records live as long as the
//! backend keeps them. The sweeper only deletes `success`/`error` records
//! whose `completed_at` is older than the retention window; it never
//! touches `processing` records and never changes a record's state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::error::TaskError;
use crate::store::TaskStore;

/// Deletes terminal records older than `retention`, every `interval`.
pub struct RetentionSweeper {
    store: Arc<dyn TaskStore>,
    retention: Duration,
    interval: Duration,
}

impl std::fmt::Debug for RetentionSweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionSweeper")
            .field("retention", &self.retention)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl RetentionSweeper {
    /// Creates a sweeper over `store`.
    pub fn new(store: Arc<dyn TaskStore>, retention: Duration, interval: Duration) -> Self {
        Self {
            store,
            retention,
            interval,
        }
    }

    /// Runs one sweep. Returns the number of records removed.
    pub async fn run_once(&self) -> Result<usize, TaskError> {
        let retention = chrono::Duration::from_std(self.retention)
            .map_err(|e| TaskError::Store(format!("retention out of range: {e}")))?;
        let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
            return Ok(0);
        };
        self.store.purge_terminal_before(cutoff).await
    }

    /// Runs sweeps forever on a background task.
    ///
    /// The first sweep happens one full interval after start. Failures are
    /// logged and the loop keeps going.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.interval);
            // The first tick completes immediately.
            timer.tick().await;
            loop {
                timer.tick().await;
                match self.run_once().await {
                    Ok(0) => tracing::debug!("retention sweep removed nothing"),
                    Ok(removed) => tracing::info!(removed, "retention sweep removed terminal tasks"),
                    Err(e) => tracing::error!(error = %e, "retention sweep failed"),
                }
            }
        })
    }
}
