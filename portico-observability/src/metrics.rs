use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};

/// Counters of one access-log pipeline.
///
/// This is the side channel for pipeline health: drops and sink failures
/// are counted here and never written into the access log itself.
/// Counters work without a registry; [`register`](Self::register) only
/// makes them visible to a scrape endpoint.
pub struct QueueStats {
    filter: String,
    enqueued: IntCounter,
    dropped: IntCounter,
    written: IntCounter,
    write_errors: IntCounter,
}

impl QueueStats {
    /// Create counters labelled with the filter instance name.
    pub fn new(filter: &str) -> prometheus::Result<Self> {
        let counter = |name: &str, help: &str| {
            IntCounter::with_opts(
                Opts::new(name, help)
                    .namespace("portico")
                    .subsystem("access_log")
                    .const_label("filter", filter),
            )
        };
        Ok(Self {
            filter: filter.to_string(),
            enqueued: counter("enqueued_total", "Records accepted by the queue")?,
            dropped: counter("dropped_total", "Records discarded on overflow or shutdown")?,
            written: counter("written_total", "Records written to the sink")?,
            write_errors: counter("write_errors_total", "Sink write failures")?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.enqueued.clone()))?;
        registry.register(Box::new(self.dropped.clone()))?;
        registry.register(Box::new(self.written.clone()))?;
        registry.register(Box::new(self.write_errors.clone()))?;
        Ok(())
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    #[inline]
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.inc();
    }

    #[inline]
    pub(crate) fn record_dropped(&self) {
        self.dropped.inc();
    }

    #[inline]
    pub(crate) fn record_written(&self) {
        self.written.inc();
    }

    #[inline]
    pub(crate) fn record_write_error(&self) {
        self.write_errors.inc();
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued.get()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.get()
    }

    pub fn written(&self) -> u64 {
        self.written.get()
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors.get()
    }
}

impl std::fmt::Debug for QueueStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStats")
            .field("filter", &self.filter)
            .field("enqueued", &self.enqueued())
            .field("dropped", &self.dropped())
            .field("written", &self.written())
            .field("write_errors", &self.write_errors())
            .finish()
    }
}

/// Render prometheus text exposition format from a registry.
pub fn render_metrics(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or(());
    String::from_utf8(buffer).unwrap_or_default()
}
