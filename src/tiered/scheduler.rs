//! Periodic migration scheduler: ticks at `migration_interval`,
//! cancellable, and never runs two passes concurrently by construction —
//! a single loop awaits each pass to completion before ticking again.

use super::TieredStorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct MigrationScheduler {
    cancel: CancellationToken,
    handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl MigrationScheduler {
    pub fn start(engine: Arc<TieredStorageEngine>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        let result = engine.perform_migration().await;
                        if result.failed > 0 {
                            warn!(migrated = result.migrated, failed = result.failed, "migration pass completed with failures");
                        } else {
                            debug!(migrated = result.migrated, "migration pass completed");
                        }
                    }
                }
            }
        });

        Self {
            cancel,
            handle: tokio::sync::Mutex::new(Some(handle)),
        }
    }

    /// Cancel the loop and await the in-flight pass, if any.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
    }
}
