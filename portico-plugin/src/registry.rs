use crate::filter::{HttpFilterFactory, HttpFilterPlugin};
use portico_core::error::{PorticoError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Filter plugin registry, keyed by filter kind.
///
/// Filled explicitly during startup composition and read-only afterwards.
pub struct FilterRegistry {
    plugins: HashMap<String, Arc<dyn HttpFilterPlugin>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    /// Register a plugin under `kind`. A second registration of the same
    /// kind replaces the first.
    pub fn register(&mut self, kind: impl Into<String>, plugin: Arc<dyn HttpFilterPlugin>) {
        let kind = kind.into();
        if self.plugins.insert(kind.clone(), plugin).is_some() {
            tracing::warn!(kind = %kind, "Filter plugin replaced");
        } else {
            tracing::info!(kind = %kind, "Registered filter plugin");
        }
    }

    /// Register a plugin under its own [`kind`](HttpFilterPlugin::kind).
    pub fn register_plugin(&mut self, plugin: Arc<dyn HttpFilterPlugin>) {
        let kind = plugin.kind().to_string();
        self.register(kind, plugin);
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn HttpFilterPlugin>> {
        self.plugins.get(kind)
    }

    /// Create a fresh filter instance of `kind`.
    pub fn create_filter(&self, kind: &str, name: &str) -> Result<Box<dyn HttpFilterFactory>> {
        let plugin = self
            .get(kind)
            .ok_or_else(|| PorticoError::UnknownFilter(kind.to_string()))?;
        plugin.create_filter(name)
    }

    /// All registered kinds, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.plugins.keys().map(|s| s.as_str()).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HttpContext;
    use crate::filter::FilterChain;

    struct MockPlugin {
        kind: String,
    }

    struct MockFilter {
        name: String,
        conf: serde_json::Value,
    }

    impl HttpFilterFactory for MockFilter {
        fn prepare_chain(&self, _ctx: &HttpContext, _chain: &mut FilterChain) -> Result<()> {
            Ok(())
        }
        fn config(&self) -> serde_json::Value {
            serde_json::json!({ "name": self.name, "conf": self.conf })
        }
        fn load_config(&mut self, raw: &serde_json::Value) -> Result<()> {
            self.conf = raw.clone();
            Ok(())
        }
        fn apply(&mut self) -> Result<()> {
            Ok(())
        }
    }

    impl HttpFilterPlugin for MockPlugin {
        fn kind(&self) -> &str {
            &self.kind
        }
        fn create_filter(&self, name: &str) -> Result<Box<dyn HttpFilterFactory>> {
            Ok(Box::new(MockFilter {
                name: name.to_string(),
                conf: serde_json::Value::Null,
            }))
        }
    }

    fn mock(kind: &str) -> Arc<dyn HttpFilterPlugin> {
        Arc::new(MockPlugin { kind: kind.into() })
    }

    #[test]
    fn test_empty_registry() {
        let reg = FilterRegistry::new();
        assert!(reg.is_empty());
        assert_eq!(reg.len(), 0);
        assert!(reg.get("nonexistent").is_none());
    }

    #[test]
    fn test_register_and_get() {
        let mut reg = FilterRegistry::new();
        reg.register("dgp.filter.http.accesslog", mock("dgp.filter.http.accesslog"));
        assert_eq!(reg.len(), 1);
        assert_eq!(
            reg.get("dgp.filter.http.accesslog").unwrap().kind(),
            "dgp.filter.http.accesslog"
        );
    }

    #[test]
    fn test_register_plugin_uses_own_kind() {
        let mut reg = FilterRegistry::new();
        reg.register_plugin(mock("dgp.filter.http.cors"));
        reg.register_plugin(mock("dgp.filter.http.accesslog"));
        assert_eq!(reg.list(), vec!["dgp.filter.http.accesslog", "dgp.filter.http.cors"]);
    }

    #[test]
    fn test_register_overwrite() {
        let mut reg = FilterRegistry::new();
        reg.register("a", mock("a"));
        reg.register("a", mock("a"));
        // Last write wins; len must still be 1
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_create_filter_unknown_kind() {
        let reg = FilterRegistry::default();
        let err = reg.create_filter("missing", "m").err().unwrap();
        assert!(matches!(err, PorticoError::UnknownFilter(k) if k == "missing"));
    }

    #[test]
    fn test_create_filter_gets_fresh_config() {
        let mut reg = FilterRegistry::new();
        reg.register_plugin(mock("k"));
        let mut first = reg.create_filter("k", "one").unwrap();
        first.load_config(&serde_json::json!({ "x": 1 })).unwrap();
        let second = reg.create_filter("k", "two").unwrap();
        assert_eq!(first.config()["conf"]["x"], 1);
        assert!(second.config()["conf"].is_null());
        assert_eq!(second.config()["name"], "two");
    }
}
