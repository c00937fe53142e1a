use portico_core::config::AccessLogConfig;
use std::sync::Arc;

/// One rendered access-log line plus the filter options it was built with.
///
/// Immutable once created. The config snapshot is shared, never mutated:
/// changing a filter's options produces a new snapshot for later records.
#[derive(Debug, Clone)]
pub struct LogRecord {
    msg: String,
    config: Arc<AccessLogConfig>,
}

impl LogRecord {
    pub fn new(msg: String, config: Arc<AccessLogConfig>) -> Self {
        Self { msg, config }
    }

    #[inline]
    pub fn msg(&self) -> &str {
        &self.msg
    }

    #[inline]
    pub fn config(&self) -> &AccessLogConfig {
        &self.config
    }
}
