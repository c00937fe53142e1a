pub mod config;
pub mod constant;
pub mod error;

pub use config::{AccessLogConfig, GatewayConfig, OverflowPolicy};
pub use error::PorticoError;
