use crate::constant::{LOG_DATA_BUFFER, MESSAGE_DATE_LAYOUT};
use figment::{Figment, providers::{Env, Format, Yaml}};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP filters to instantiate, in chain order.
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    /// Capacity of each access-log record queue.
    #[serde(default = "default_access_log_buffer")]
    pub access_log_buffer: usize,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// One configured filter instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Registered filter kind, e.g. `dgp.filter.http.accesslog`.
    pub kind: String,
    /// Instance name used in metrics and log fields. Defaults to the kind.
    #[serde(default)]
    pub name: Option<String>,
    /// Raw filter options, handed to the filter's config loader as-is.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl FilterSpec {
    pub fn instance_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// When false, access-log counters are kept but never exported.
    #[serde(default)]
    pub enabled: bool,
}

/// What the record queue does with a new record when it is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Suspend the request until the writer frees a slot. No record is lost.
    #[default]
    Block,
    /// Return immediately, discard the record and count the drop.
    Drop,
}

/// Options of one access-log filter instance.
///
/// Every queued record carries its own snapshot of this struct, so the
/// writer never reads options that changed after the record was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Append records to this file. `None` writes them to stdout.
    #[serde(default, alias = "outputpath")]
    pub output_path: Option<PathBuf>,
    #[serde(default)]
    pub overflow: OverflowPolicy,
    /// `chrono` format string for the leading timestamp.
    #[serde(default = "default_time_layout")]
    pub time_layout: String,
}

// ── Defaults ──────────────────────────────────────────────────

fn default_access_log_buffer() -> usize { LOG_DATA_BUFFER }
fn default_true() -> bool { true }
fn default_time_layout() -> String { MESSAGE_DATE_LAYOUT.into() }

// ── Impls ─────────────────────────────────────────────────────

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            access_log_buffer: default_access_log_buffer(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            prometheus: PrometheusConfig::default(),
        }
    }
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self { enabled: false }
    }
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_path: None,
            overflow: OverflowPolicy::Block,
            time_layout: default_time_layout(),
        }
    }
}

impl AccessLogConfig {
    /// Parse filter options from the raw value of a [`FilterSpec`].
    /// `null` yields the defaults.
    pub fn from_value(raw: &serde_json::Value) -> crate::error::Result<Self> {
        if raw.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(raw.clone())?)
    }
}

impl GatewayConfig {
    /// Load configuration from YAML file + env overrides.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let config: GatewayConfig = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("PORTICO_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.access_log_buffer == 0 {
            return Err(crate::error::PorticoError::Config(
                "access_log_buffer must be at least 1".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for spec in &self.filters {
            if spec.kind.trim().is_empty() {
                return Err(crate::error::PorticoError::Config(
                    "filter kind must not be empty".into(),
                ));
            }
            if !seen.insert(spec.instance_name()) {
                return Err(crate::error::PorticoError::Config(format!(
                    "duplicate filter instance name {:?}; give each instance a unique `name`",
                    spec.instance_name()
                )));
            }
        }
        Ok(())
    }
}
