pub mod accesslog;

use portico_plugin::registry::FilterRegistry;
use std::sync::Arc;

/// Register all built-in filters.
pub fn register_all(registry: &mut FilterRegistry) {
    registry.register_plugin(Arc::new(accesslog::AccessLogPlugin::new()));
}

/// Register all built-in filters, exporting pipeline counters to `metrics`
/// and sizing access-log queues to `buffer_size` records.
pub fn register_all_with(
    registry: &mut FilterRegistry,
    buffer_size: usize,
    metrics: Option<prometheus::Registry>,
) {
    let mut plugin = accesslog::AccessLogPlugin::new().with_buffer_size(buffer_size);
    if let Some(metrics) = metrics {
        plugin = plugin.with_metrics(metrics);
    }
    registry.register_plugin(Arc::new(plugin));
}
