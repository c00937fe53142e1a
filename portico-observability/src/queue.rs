//! Bounded FIFO between request handlers and the access-log writer.
//!
//! Many [`RecordSender`]s, one [`RecordReceiver`]. Capacity is fixed when
//! the queue is built. What happens to a record that arrives while the
//! queue is full is decided by the record's own [`OverflowPolicy`]:
//!
//! * `Block` suspends the calling request until the writer frees a slot.
//!   Nothing is lost; a slow sink shows up as request latency.
//! * `Drop` returns at once and counts the record as dropped. The request
//!   never waits; a slow sink shows up as missing lines.

use crate::metrics::QueueStats;
use crate::record::LogRecord;
use portico_core::config::OverflowPolicy;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Outcome of one enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// The record is queued and will be written.
    Accepted,
    /// The queue was full under `Drop`; the record is gone.
    Dropped,
    /// The writer is gone; the record is gone.
    Closed,
}

/// Build a queue holding at most `capacity` records (at least one).
pub fn bounded(capacity: usize, stats: Arc<QueueStats>) -> (RecordSender, RecordReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (RecordSender { tx, stats }, RecordReceiver { rx })
}

/// Producer side; cheap to clone, one per in-flight request if needed.
#[derive(Clone)]
pub struct RecordSender {
    tx: mpsc::Sender<LogRecord>,
    stats: Arc<QueueStats>,
}

impl RecordSender {
    /// Enqueue following the record's overflow policy.
    pub async fn enqueue(&self, record: LogRecord) -> Enqueued {
        match record.config().overflow {
            OverflowPolicy::Block => match self.tx.send(record).await {
                Ok(()) => {
                    self.stats.record_enqueued();
                    Enqueued::Accepted
                }
                Err(_) => {
                    self.stats.record_dropped();
                    Enqueued::Closed
                }
            },
            OverflowPolicy::Drop => self.try_enqueue(record),
        }
    }

    /// Enqueue without ever waiting, whatever the record's policy says.
    pub fn try_enqueue(&self, record: LogRecord) -> Enqueued {
        match self.tx.try_send(record) {
            Ok(()) => {
                self.stats.record_enqueued();
                Enqueued::Accepted
            }
            Err(TrySendError::Full(_)) => {
                self.stats.record_dropped();
                Enqueued::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.record_dropped();
                Enqueued::Closed
            }
        }
    }

    /// Fixed capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Records currently waiting for the writer.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn stats(&self) -> &Arc<QueueStats> {
        &self.stats
    }
}

/// Consumer side, owned by the writer.
pub struct RecordReceiver {
    rx: mpsc::Receiver<LogRecord>,
}

impl RecordReceiver {
    /// Block the current thread until a record arrives. `None` once every
    /// sender is gone and the queue is drained.
    ///
    /// Must not be called from inside an async runtime.
    pub fn dequeue_blocking(&mut self) -> Option<LogRecord> {
        self.rx.blocking_recv()
    }

    pub async fn dequeue(&mut self) -> Option<LogRecord> {
        self.rx.recv().await
    }
}
