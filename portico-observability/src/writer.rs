use crate::metrics::QueueStats;
use crate::queue::{self, RecordReceiver, RecordSender};
use crate::sink::LogSink;
use portico_core::error::{PorticoError, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Background consumer of one access-log queue.
///
/// The queue exists from construction, so senders can enqueue before
/// [`start`](Self::start); those records wait in the queue (up to its
/// capacity) and are written once the writer runs.
///
/// The writer runs on its own OS thread so that sink I/O never occupies an
/// async worker. There is no stop call: the loop ends when every sender,
/// including the one held here, has been dropped and the queue is drained.
pub struct AccessLogWriter {
    sender: RecordSender,
    pending: Mutex<Option<(RecordReceiver, Box<dyn LogSink>)>>,
    stats: Arc<QueueStats>,
    handle: Option<JoinHandle<()>>,
}

impl AccessLogWriter {
    pub fn new(capacity: usize, stats: Arc<QueueStats>, sink: Box<dyn LogSink>) -> Self {
        let (sender, receiver) = queue::bounded(capacity, Arc::clone(&stats));
        Self {
            sender,
            pending: Mutex::new(Some((receiver, sink))),
            stats,
            handle: None,
        }
    }

    /// A producer handle onto this writer's queue.
    pub fn sender(&self) -> RecordSender {
        self.sender.clone()
    }

    pub fn stats(&self) -> &Arc<QueueStats> {
        &self.stats
    }

    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the consume loop. Fails if it is already running.
    pub fn start(&mut self) -> Result<()> {
        let (receiver, sink) = self
            .pending
            .get_mut()
            .map_err(|_| PorticoError::Internal("access log writer state poisoned".into()))?
            .take()
            .ok_or(PorticoError::WriterStarted)?;
        let stats = Arc::clone(&self.stats);
        let handle = std::thread::Builder::new()
            .name("access-log-writer".to_string())
            .spawn(move || write_loop(receiver, sink, stats))?;
        info!(filter = %self.stats.filter(), "Access log writer started");
        self.handle = Some(handle);
        Ok(())
    }
}

/// Exactly one write attempt per record, in dequeue order. A failed or
/// panicking write is counted and reported, then the loop moves on.
fn write_loop(mut receiver: RecordReceiver, mut sink: Box<dyn LogSink>, stats: Arc<QueueStats>) {
    while let Some(record) = receiver.dequeue_blocking() {
        match panic::catch_unwind(AssertUnwindSafe(|| sink.write(&record))) {
            Ok(Ok(())) => stats.record_written(),
            Ok(Err(e)) => {
                stats.record_write_error();
                warn!(filter = %stats.filter(), error = %e, "Access log write failed");
            }
            Err(_) => {
                stats.record_write_error();
                warn!(filter = %stats.filter(), "Access log sink panicked");
            }
        }
    }

    if let Err(e) = sink.flush() {
        warn!(filter = %stats.filter(), error = %e, "Access log flush failed");
    }
    debug!(
        filter = %stats.filter(),
        written = stats.written(),
        write_errors = stats.write_errors(),
        "Access log writer stopped"
    );
}
