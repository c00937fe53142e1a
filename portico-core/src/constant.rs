//! Well-known identifiers and defaults shared across the workspace.

/// Filter kind under which the HTTP access-log plugin registers.
pub const HTTP_ACCESS_LOG_FILTER: &str = "dgp.filter.http.accesslog";

/// Capacity of each access-log record queue (records, not bytes).
pub const LOG_DATA_BUFFER: usize = 5000;

/// `chrono` layout of the timestamp that opens every access-log line.
/// Renders as `2024-03-01 12:30:45.123`.
pub const MESSAGE_DATE_LAYOUT: &str = "%Y-%m-%d %H:%M:%S%.3f";
