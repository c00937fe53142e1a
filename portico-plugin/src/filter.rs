use crate::context::HttpContext;
use async_trait::async_trait;
use portico_core::error::Result;
use std::sync::Arc;

/// A filter kind known to the host. Registered once at startup.
pub trait HttpFilterPlugin: Send + Sync {
    /// Kind identifier (must be unique), e.g. `dgp.filter.http.accesslog`.
    fn kind(&self) -> &str;

    /// Build a new filter instance with default (empty) configuration.
    /// `name` identifies the instance in metrics and operational logs.
    fn create_filter(&self, name: &str) -> Result<Box<dyn HttpFilterFactory>>;
}

/// A configured filter instance, living for the whole process.
///
/// The host drives it in this order: [`load_config`](Self::load_config),
/// [`apply`](Self::apply), then [`prepare_chain`](Self::prepare_chain) once
/// per request.
pub trait HttpFilterFactory: Send + Sync {
    /// Append this instance's per-request handler to `chain`.
    fn prepare_chain(&self, ctx: &HttpContext, chain: &mut FilterChain) -> Result<()>;

    /// Current configuration as a JSON value.
    fn config(&self) -> serde_json::Value;

    /// Replace the configuration with raw options from the config system.
    fn load_config(&mut self, raw: &serde_json::Value) -> Result<()>;

    /// Finish initialization once configuration is final.
    fn apply(&mut self) -> Result<()>;
}

/// Per-request handler placed on a [`FilterChain`].
#[async_trait]
pub trait HttpFilter: Send + Sync {
    fn name(&self) -> &str;

    /// Run around the rest of the chain. Call `next.run(ctx)` to continue.
    async fn handle(&self, ctx: &mut HttpContext, next: Next<'_>);
}

/// Terminal downstream handler, invoked after the last filter.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, ctx: &mut HttpContext);
}

#[async_trait]
impl<F> Endpoint for F
where
    F: Fn(&mut HttpContext) + Send + Sync,
{
    async fn call(&self, ctx: &mut HttpContext) {
        self(ctx)
    }
}

/// The remainder of a chain, handed to each filter.
pub struct Next<'a> {
    filters: &'a [Arc<dyn HttpFilter>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    /// Continue processing: the next filter, or the endpoint when none remain.
    pub async fn run(self, ctx: &mut HttpContext) {
        match self.filters.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    filters: rest,
                    endpoint: self.endpoint,
                };
                head.handle(ctx, next).await
            }
            None => self.endpoint.call(ctx).await,
        }
    }
}

/// Ordered filters built for a single request.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn HttpFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, filter: Arc<dyn HttpFilter>) {
        self.filters.push(filter);
    }

    /// Run every filter around `endpoint`, in append order.
    pub async fn run(&self, ctx: &mut HttpContext, endpoint: &dyn Endpoint) {
        Next {
            filters: &self.filters,
            endpoint,
        }
        .run(ctx)
        .await
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
