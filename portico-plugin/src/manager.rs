use crate::context::HttpContext;
use crate::filter::{Endpoint, FilterChain, HttpFilterFactory};
use crate::registry::FilterRegistry;
use portico_core::config::FilterSpec;
use portico_core::error::{PorticoError, Result};
use std::collections::HashSet;

/// The configured filter instances of a listener, in chain order.
///
/// Built once at startup; each request gets its own [`FilterChain`]
/// assembled from these instances.
pub struct FilterManager {
    filters: Vec<(String, Box<dyn HttpFilterFactory>)>,
}

impl FilterManager {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Create, configure and apply every filter in `specs`.
    ///
    /// Configuration is loaded before `apply`, so no instance starts work
    /// on partially initialized options.
    ///
    /// Instance names must be unique; a duplicate is rejected before any
    /// instance is created.
    pub fn from_specs(registry: &FilterRegistry, specs: &[FilterSpec]) -> Result<Self> {
        let mut names = HashSet::new();
        for spec in specs {
            if !names.insert(spec.instance_name()) {
                return Err(PorticoError::Config(format!(
                    "duplicate filter instance name {:?}",
                    spec.instance_name()
                )));
            }
        }

        let mut manager = Self::new();
        for spec in specs {
            let name = spec.instance_name();
            let mut filter = registry.create_filter(&spec.kind, name)?;
            filter.load_config(&spec.config)?;
            filter.apply()?;
            tracing::info!(kind = %spec.kind, filter = %name, "Filter instance ready");
            manager.push(name, filter);
        }
        Ok(manager)
    }

    /// Add an already applied instance at the end of the chain.
    pub fn push(&mut self, name: impl Into<String>, filter: Box<dyn HttpFilterFactory>) {
        self.filters.push((name.into(), filter));
    }

    /// Assemble the chain for one request.
    ///
    /// An instance that fails to prepare is left out of this request's
    /// chain; the request itself still proceeds.
    pub fn build_chain(&self, ctx: &HttpContext) -> FilterChain {
        let mut chain = FilterChain::new();
        for (name, filter) in &self.filters {
            if let Err(e) = filter.prepare_chain(ctx, &mut chain) {
                tracing::error!(filter = %name, error = %e, "Failed to prepare filter chain");
            }
        }
        chain
    }

    /// Run one request through every filter and then `endpoint`.
    pub async fn dispatch(&self, ctx: &mut HttpContext, endpoint: &dyn Endpoint) {
        let chain = self.build_chain(ctx);
        chain.run(ctx, endpoint).await
    }

    pub fn get(&self, name: &str) -> Option<&dyn HttpFilterFactory> {
        self.filters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Default for FilterManager {
    fn default() -> Self {
        Self::new()
    }
}
