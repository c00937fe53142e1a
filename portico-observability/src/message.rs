//! Access-log line rendering.
//!
//! A line looks like:
//!
//! ```text
//! [2024-03-01 12:30:45.123] 10.0.0.5:1234 -> api.example.com - request params: [a=1,b=2] cost time [ 2500000 ] response [ {"ok":true} ]
//! ```
//!
//! The params segment is present only for a non-empty query string, the
//! `invoke err [ .. ]` segment only when downstream handling failed, and the
//! response segment is replaced by [`RESPONSE_UNAVAILABLE`] when the payload
//! is missing or cannot be rendered.

use chrono::Local;
use chrono::format::{Item, StrftimeItems};
use portico_core::constant::MESSAGE_DATE_LAYOUT;
use portico_plugin::context::HttpContext;
use std::fmt::Write;
use std::time::Duration;

/// Substituted for the response segment when the payload has no rendering.
pub const RESPONSE_UNAVAILABLE: &str = "response can not convert to string";

/// Whether `layout` is a usable `chrono` strftime layout.
pub fn is_valid_time_layout(layout: &str) -> bool {
    !StrftimeItems::new(layout).any(|item| matches!(item, Item::Error))
}

/// Render one completed exchange.
///
/// The timestamp is taken now, when the line is built, not when the
/// request started. `cost` is written as whole nanoseconds.
pub fn build_access_log_msg(ctx: &HttpContext, cost: Duration, time_layout: &str) -> String {
    let mut builder = String::with_capacity(256);

    builder.push('[');
    write_timestamp(&mut builder, time_layout);
    builder.push_str("] ");
    // Writing into a String cannot fail.
    let _ = write!(builder, "{}", ctx.remote_addr);
    builder.push_str(" -> ");
    builder.push_str(ctx.host());
    builder.push_str(" - ");

    let query = ctx.raw_query();
    if !query.is_empty() {
        builder.push_str("request params: [");
        for (i, pair) in query.split('&').enumerate() {
            if i > 0 {
                builder.push(',');
            }
            builder.push_str(pair);
        }
        builder.push_str("] ");
    }

    let nanos = u64::try_from(cost.as_nanos()).unwrap_or(u64::MAX);
    let mut buf = itoa::Buffer::new();
    builder.push_str("cost time [ ");
    builder.push_str(buf.format(nanos));
    builder.push_str(" ]");

    if let Some(err) = &ctx.err {
        let _ = write!(builder, " invoke err [ {err:#} ]");
    }

    match ctx.target_resp.as_deref().map(|resp| resp.render_for_log()) {
        Some(Ok(bytes)) => {
            builder.push_str(" response [ ");
            builder.push_str(&String::from_utf8_lossy(&bytes));
            builder.push_str(" ]");
        }
        Some(Err(e)) => {
            tracing::trace!(error = %e, "Response payload not renderable");
            builder.push(' ');
            builder.push_str(RESPONSE_UNAVAILABLE);
        }
        None => {
            builder.push(' ');
            builder.push_str(RESPONSE_UNAVAILABLE);
        }
    }

    builder
}

fn write_timestamp(buf: &mut String, layout: &str) {
    let now = Local::now();
    let start = buf.len();
    if write!(buf, "{}", now.format(layout)).is_err() {
        buf.truncate(start);
        let _ = write!(buf, "{}", now.format(MESSAGE_DATE_LAYOUT));
    }
}
