pub mod message;
pub mod metrics;
pub mod queue;
pub mod record;
pub mod sink;
pub mod writer;

pub use message::build_access_log_msg;
pub use metrics::{QueueStats, render_metrics};
pub use queue::{Enqueued, RecordReceiver, RecordSender};
pub use record::LogRecord;
pub use sink::{ConsoleSink, FileSink, LogSink, RoutingSink};
pub use writer::AccessLogWriter;
