pub mod context;
pub mod filter;
pub mod manager;
pub mod registry;

pub use context::{HttpContext, LogRender, Opaque, RenderError};
pub use filter::{Endpoint, FilterChain, HttpFilter, HttpFilterFactory, HttpFilterPlugin, Next};
pub use manager::FilterManager;
pub use registry::FilterRegistry;
