//! HTTP access-log filter.
//!
//! Times every request around the rest of the chain, renders one text line
//! per exchange and hands it to a per-instance background writer through a
//! bounded queue. Nothing in here can fail a request: render problems end
//! up in the line, queue and sink problems end up in the counters.
//!
//! Configuration:
//! ```yaml
//! - kind: dgp.filter.http.accesslog
//!   config:
//!     outputpath: /var/log/portico/access.log   # omit for stdout
//!     overflow: block                            # or: drop
//!     time_layout: "%Y-%m-%d %H:%M:%S%.3f"
//! ```

use async_trait::async_trait;
use portico_core::config::AccessLogConfig;
use portico_core::constant::{HTTP_ACCESS_LOG_FILTER, LOG_DATA_BUFFER};
use portico_core::error::{PorticoError, Result};
use portico_observability::message::{build_access_log_msg, is_valid_time_layout};
use portico_observability::{
    AccessLogWriter, Enqueued, LogRecord, LogSink, QueueStats, RecordSender, RoutingSink,
};
use portico_plugin::context::HttpContext;
use portico_plugin::filter::{FilterChain, HttpFilter, HttpFilterFactory, HttpFilterPlugin, Next};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Factory for access-log filter instances.
pub struct AccessLogPlugin {
    buffer_size: usize,
    metrics: Option<prometheus::Registry>,
}

impl AccessLogPlugin {
    pub fn new() -> Self {
        Self {
            buffer_size: LOG_DATA_BUFFER,
            metrics: None,
        }
    }

    /// Queue capacity for instances created from now on.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Register each instance's counters in `registry`.
    pub fn with_metrics(mut self, registry: prometheus::Registry) -> Self {
        self.metrics = Some(registry);
        self
    }
}

impl Default for AccessLogPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFilterPlugin for AccessLogPlugin {
    fn kind(&self) -> &str {
        HTTP_ACCESS_LOG_FILTER
    }

    fn create_filter(&self, name: &str) -> Result<Box<dyn HttpFilterFactory>> {
        let filter = AccessLogFilter::new(name, self.buffer_size, Box::new(RoutingSink::new()))?;
        if let Some(registry) = &self.metrics {
            filter
                .writer()
                .stats()
                .register(registry)
                .map_err(|e| PorticoError::Internal(format!("access log metrics: {e}")))?;
        }
        Ok(Box::new(filter))
    }
}

/// One configured access-log instance: its options and its writer.
pub struct AccessLogFilter {
    conf: Arc<AccessLogConfig>,
    alw: AccessLogWriter,
}

impl AccessLogFilter {
    /// Build an instance with default options and a writer that is not
    /// running yet. Requests may already be logged; their records queue up
    /// until [`apply`](HttpFilterFactory::apply).
    pub fn new(name: &str, buffer_size: usize, sink: Box<dyn LogSink>) -> Result<Self> {
        let stats = QueueStats::new(name)
            .map_err(|e| PorticoError::Internal(format!("access log metrics: {e}")))?;
        Ok(Self {
            conf: Arc::new(AccessLogConfig::default()),
            alw: AccessLogWriter::new(buffer_size, Arc::new(stats), sink),
        })
    }

    pub fn access_log_config(&self) -> &AccessLogConfig {
        &self.conf
    }

    /// Edit the options. Records already built keep the options they were
    /// built with.
    pub fn access_log_config_mut(&mut self) -> &mut AccessLogConfig {
        Arc::make_mut(&mut self.conf)
    }

    pub fn writer(&self) -> &AccessLogWriter {
        &self.alw
    }

    /// Per-request hook bound to the current options.
    pub fn handle(&self) -> AccessLogHandle {
        AccessLogHandle {
            conf: Arc::clone(&self.conf),
            sender: self.alw.sender(),
        }
    }
}

impl HttpFilterFactory for AccessLogFilter {
    fn prepare_chain(&self, _ctx: &HttpContext, chain: &mut FilterChain) -> Result<()> {
        chain.append(Arc::new(self.handle()));
        Ok(())
    }

    fn config(&self) -> serde_json::Value {
        serde_json::to_value(self.conf.as_ref()).unwrap_or_default()
    }

    fn load_config(&mut self, raw: &serde_json::Value) -> Result<()> {
        let conf = AccessLogConfig::from_value(raw)?;
        if !is_valid_time_layout(&conf.time_layout) {
            return Err(PorticoError::Config(format!(
                "invalid access log time_layout {:?}",
                conf.time_layout
            )));
        }
        self.conf = Arc::new(conf);
        Ok(())
    }

    fn apply(&mut self) -> Result<()> {
        self.alw.start()
    }
}

/// The filter hook placed on each request's chain.
pub struct AccessLogHandle {
    conf: Arc<AccessLogConfig>,
    sender: RecordSender,
}

impl AccessLogHandle {
    #[inline]
    pub fn on_request_start(&self) -> Instant {
        Instant::now()
    }

    /// Log the exchange that started at `start`.
    pub async fn on_request_complete(&self, ctx: &HttpContext, start: Instant) -> Option<Enqueued> {
        self.log_exchange(ctx, start.elapsed()).await
    }

    /// Render the exchange and queue it. `None` when nothing was logged.
    pub async fn log_exchange(&self, ctx: &HttpContext, cost: Duration) -> Option<Enqueued> {
        if !self.conf.enabled {
            return None;
        }
        let msg = build_access_log_msg(ctx, cost, &self.conf.time_layout);
        if msg.is_empty() {
            return None;
        }
        let record = LogRecord::new(msg, Arc::clone(&self.conf));
        let outcome = self.sender.enqueue(record).await;
        if outcome != Enqueued::Accepted {
            tracing::trace!(?outcome, "Access log record not queued");
        }
        Some(outcome)
    }
}

#[async_trait]
impl HttpFilter for AccessLogHandle {
    fn name(&self) -> &str {
        HTTP_ACCESS_LOG_FILTER
    }

    async fn handle(&self, ctx: &mut HttpContext, next: Next<'_>) {
        let start = self.on_request_start();
        next.run(ctx).await;
        self.on_request_complete(ctx, start).await;
    }
}
