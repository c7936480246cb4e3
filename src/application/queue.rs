use crate::domain::order::{OrderItem, Priority};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Maximum queue retries per item; the first attempt plus three retries.
pub const MAX_RETRIES: u32 = 3;

/// Processor invoked by queue workers, one order item at a time.
#[async_trait]
pub trait OrderProcessor: Send + Sync {
    async fn process(&self, item: &OrderItem) -> Result<()>;
}

enum QueueEntry {
    Order(OrderItem),
    /// One per worker, enqueued at LOW priority so real work drains first.
    Shutdown,
}

struct QueueSlot {
    priority: Priority,
    sequence: u64,
    entry: QueueEntry,
}

impl QueueSlot {
    fn order(item: OrderItem, sequence: u64) -> Self {
        Self {
            priority: item.priority,
            sequence,
            entry: QueueEntry::Order(item),
        }
    }

    fn sentinel(sequence: u64) -> Self {
        Self {
            priority: Priority::Low,
            sequence,
            entry: QueueEntry::Shutdown,
        }
    }
}

impl Eq for QueueSlot {}

impl PartialEq for QueueSlot {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Ord for QueueSlot {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse so High wins, then lower
        // sequence. Same-priority ordering is an implementation detail
        // callers must not rely on.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueueSlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct QueueStats {
    processed: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
}

/// Final counts reported by [`OrderQueue::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueReport {
    pub processed: u64,
    pub retried: u64,
    pub failed: u64,
    pub queued: u64,
}

struct QueueCore {
    heap: Mutex<BinaryHeap<QueueSlot>>,
    /// One permit per queued slot; workers block here when the heap is empty.
    slots: Semaphore,
    sequence: AtomicU64,
    stats: QueueStats,
}

impl QueueCore {
    fn push(&self, slot: QueueSlot) {
        self.heap.lock().push(slot);
        self.slots.add_permits(1);
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, AtomicOrdering::Relaxed)
    }

    async fn pop(&self) -> QueueEntry {
        match self.slots.acquire().await {
            Ok(permit) => permit.forget(),
            // Closed semaphore means the queue is gone; treat as shutdown.
            Err(_) => return QueueEntry::Shutdown,
        }
        let slot = self.heap.lock().pop();
        match slot {
            Some(slot) => slot.entry,
            None => QueueEntry::Shutdown,
        }
    }
}

/// Priority queue plus a fixed pool of worker tasks.
///
/// Items are dequeued strictly by priority. A processor failure re-enqueues
/// the item at HIGH priority after `2^retries` seconds, up to [`MAX_RETRIES`]
/// retries; after that the item is counted permanently failed and dropped
/// (escalation belongs to the sync driver or an operator, not the queue).
pub struct OrderQueue {
    core: Arc<QueueCore>,
    workers: Vec<JoinHandle<()>>,
    worker_count: usize,
}

impl OrderQueue {
    pub fn new(worker_count: usize) -> Self {
        Self {
            core: Arc::new(QueueCore {
                heap: Mutex::new(BinaryHeap::new()),
                slots: Semaphore::new(0),
                sequence: AtomicU64::new(0),
                stats: QueueStats::default(),
            }),
            workers: Vec::new(),
            worker_count,
        }
    }

    /// Spawns the worker pool. Items may be enqueued before or after.
    pub fn start(&mut self, processor: Arc<dyn OrderProcessor>) {
        for worker_id in 0..self.worker_count {
            let core = Arc::clone(&self.core);
            let processor = Arc::clone(&processor);
            self.workers
                .push(tokio::spawn(worker_loop(worker_id, core, processor)));
        }
    }

    pub fn enqueue(&self, item: OrderItem) {
        let sequence = self.core.next_sequence();
        debug!(order_id = %item.order_id, priority = ?item.priority, "order enqueued");
        self.core.push(QueueSlot::order(item, sequence));
    }

    /// Enqueues one shutdown sentinel per worker, waits for every worker to
    /// observe its sentinel, and reports final counts.
    pub async fn stop(mut self) -> QueueReport {
        for _ in 0..self.worker_count {
            let sequence = self.core.next_sequence();
            self.core.push(QueueSlot::sentinel(sequence));
        }
        for handle in self.workers.drain(..) {
            if let Err(err) = handle.await {
                error!(error = %err, "queue worker panicked");
            }
        }
        let queued = self
            .core
            .heap
            .lock()
            .iter()
            .filter(|slot| matches!(slot.entry, QueueEntry::Order(_)))
            .count() as u64;
        QueueReport {
            processed: self.core.stats.processed.load(AtomicOrdering::Relaxed),
            retried: self.core.stats.retried.load(AtomicOrdering::Relaxed),
            failed: self.core.stats.failed.load(AtomicOrdering::Relaxed),
            queued,
        }
    }
}

async fn worker_loop(worker_id: usize, core: Arc<QueueCore>, processor: Arc<dyn OrderProcessor>) {
    loop {
        match core.pop().await {
            QueueEntry::Shutdown => {
                debug!(worker = worker_id, "worker drained shutdown sentinel");
                break;
            }
            QueueEntry::Order(mut item) => match processor.process(&item).await {
                Ok(()) => {
                    core.stats.processed.fetch_add(1, AtomicOrdering::Relaxed);
                }
                Err(err) => {
                    if item.retries < MAX_RETRIES {
                        item.retries += 1;
                        item.priority = Priority::High;
                        let backoff = Duration::from_secs(1 << item.retries);
                        warn!(
                            worker = worker_id,
                            order_id = %item.order_id,
                            retry = item.retries,
                            backoff_secs = backoff.as_secs(),
                            error = %err,
                            "processor failed, re-enqueueing"
                        );
                        core.stats.retried.fetch_add(1, AtomicOrdering::Relaxed);
                        tokio::time::sleep(backoff).await;
                        let sequence = core.next_sequence();
                        core.push(QueueSlot::order(item, sequence));
                    } else {
                        error!(
                            worker = worker_id,
                            order_id = %item.order_id,
                            error = %err,
                            "retries exhausted, order item permanently failed"
                        );
                        core.stats.failed.fetch_add(1, AtomicOrdering::Relaxed);
                    }
                }
            },
        }
    }
}
