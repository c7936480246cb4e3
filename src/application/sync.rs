use crate::application::queue::OrderQueue;
use crate::domain::ports::OrderSource;
use crate::error::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// Daemon loop that periodically pulls newly-created orders from an
/// external source and enqueues them.
///
/// Orders already handed to the queue are remembered by id so a source that
/// keeps returning them (e.g. a file re-read every cycle) does not enqueue
/// duplicates within this driver's lifetime.
pub struct SyncDriver {
    source: Arc<dyn OrderSource>,
    interval: Duration,
    seen: HashSet<String>,
}

impl SyncDriver {
    pub fn new(source: Arc<dyn OrderSource>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            seen: HashSet::new(),
        }
    }

    /// One pull-and-enqueue cycle; returns how many orders were enqueued.
    pub async fn run_cycle(&mut self, queue: &OrderQueue) -> Result<usize> {
        let items = self.source.fetch_created().await?;
        let mut enqueued = 0;
        for item in items {
            if !self.seen.insert(item.order_id.clone()) {
                continue;
            }
            queue.enqueue(item);
            enqueued += 1;
        }
        if enqueued > 0 {
            info!(enqueued, "sync cycle enqueued new orders");
        }
        Ok(enqueued)
    }

    /// Runs cycles on the configured interval until `shutdown` flips true.
    /// Source failures are logged and retried next cycle.
    pub async fn run(mut self, queue: &OrderQueue, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(err) = self.run_cycle(queue).await {
                        error!(error = %err, "sync cycle failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("sync driver stopping");
                        return;
                    }
                }
            }
        }
    }
}
