//! Property lookup for switches that are consulted on every call
//!
//! The reporter flag is read per call rather than once at startup, so a
//! [`ReloadableConfig`] swap or an environment override takes effect for the
//! next call without rebuilding the pipeline.

use crate::types::Config;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Key of the reporter flag
pub const REPORTER_KEY: &str = "rpc_enhancement.reporter";

/// Key of the pre-stage plugin switch
pub const PRE_STAGE_PLUGINS_KEY: &str = "rpc_enhancement.pre_stage_plugins";

/// A source of string-valued configuration properties
pub trait PropertySource: Send + Sync + fmt::Debug {
    /// Look up a property by its dotted key
    fn property(&self, key: &str) -> Option<String>;
}

/// Interpret a string flag: absent, empty or `"true"` means enabled
///
/// The comparison is exact; `"TRUE"` or `" true"` disable the feature.
pub fn flag_enabled(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.is_empty() || v == "true",
    }
}

/// Whether the post/finally stages should run according to `source`
pub fn is_reporter_enabled(source: &dyn PropertySource) -> bool {
    flag_enabled(source.property(REPORTER_KEY).as_deref())
}

impl PropertySource for Config {
    fn property(&self, key: &str) -> Option<String> {
        match key {
            REPORTER_KEY => self.rpc_enhancement.reporter.clone(),
            PRE_STAGE_PLUGINS_KEY => {
                Some(self.rpc_enhancement.pre_stage_plugins_enabled().to_string())
            }
            "observability.logging.level" => Some(self.observability.logging.level().to_string()),
            "observability.logging.format" => Some(self.observability.logging.format().to_string()),
            _ => None,
        }
    }
}

impl PropertySource for HashMap<String, String> {
    fn property(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Properties read from environment variables
///
/// `rpc_enhancement.reporter` with prefix `OUTRIG` is looked up as
/// `OUTRIG_RPC_ENHANCEMENT_REPORTER`.
#[derive(Debug, Clone)]
pub struct EnvProperties {
    prefix: String,
}

impl EnvProperties {
    /// Create an environment source with the given variable prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable name for a dotted key
    pub fn var_name(&self, key: &str) -> String {
        let suffix: String = key
            .chars()
            .map(|c| match c {
                '.' | '-' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();

        if self.prefix.is_empty() {
            suffix
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl Default for EnvProperties {
    fn default() -> Self {
        Self::new("OUTRIG")
    }
}

impl PropertySource for EnvProperties {
    fn property(&self, key: &str) -> Option<String> {
        std::env::var(self.var_name(key)).ok()
    }
}

/// Ordered stack of property sources; the first source with a value wins
#[derive(Debug, Clone, Default)]
pub struct LayeredProperties {
    sources: Vec<Arc<dyn PropertySource>>,
}

impl LayeredProperties {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lower-priority source
    pub fn with(mut self, source: Arc<dyn PropertySource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Number of layered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if no source is layered
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl PropertySource for LayeredProperties {
    fn property(&self, key: &str) -> Option<String> {
        self.sources.iter().find_map(|source| source.property(key))
    }
}

/// Configuration that can be replaced while calls are in flight
pub struct ReloadableConfig {
    current: ArcSwap<Config>,
}

impl ReloadableConfig {
    /// Wrap an initial configuration
    pub fn new(config: Config) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
        }
    }

    /// Current configuration
    pub fn load(&self) -> Arc<Config> {
        self.current.load_full()
    }

    /// Replace the configuration; subsequent lookups see the new values
    pub fn store(&self, config: Config) {
        self.current.store(Arc::new(config));
        tracing::info!("Configuration reloaded");
    }
}

impl fmt::Debug for ReloadableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadableConfig")
            .field("current", &self.load())
            .finish()
    }
}

impl PropertySource for ReloadableConfig {
    fn property(&self, key: &str) -> Option<String> {
        self.current.load().property(key)
    }
}
