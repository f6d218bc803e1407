//! Configuration builder

use crate::types::{Config, LoggingConfig, PluginConfig};

/// Builder for constructing configuration programmatically
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reporter flag value
    pub fn reporter(mut self, value: impl Into<String>) -> Self {
        self.config.rpc_enhancement.reporter = Some(value.into());
        self
    }

    /// Enable or disable pre-stage plugin execution
    pub fn pre_stage_plugins(mut self, enabled: bool) -> Self {
        self.config.rpc_enhancement.pre_stage_plugins = Some(enabled);
        self
    }

    /// Add a plugin entry
    pub fn plugin(mut self, plugin: PluginConfig) -> Self {
        self.config.rpc_enhancement.plugins.push(plugin);
        self
    }

    /// Set logging configuration
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.observability.logging = logging;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> outrig_core::Result<Config> {
        crate::validator::validate_config(&self.config)?;
        Ok(self.config)
    }
}
