//! Configuration validation

use crate::Config;
use outrig_core::{Error, Result};
use std::collections::HashSet;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["text", "json"];

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_plugins(config)?;
    validate_observability(config)?;

    if let Some(reporter) = config.rpc_enhancement.reporter.as_deref() {
        if !crate::flag_enabled(Some(reporter)) {
            tracing::info!(
                reporter = %reporter,
                "Reporter flag is not \"true\"; post and finally stages are disabled"
            );
        }
    }

    Ok(())
}

fn validate_plugins(config: &Config) -> Result<()> {
    let mut seen = HashSet::new();

    for plugin in &config.rpc_enhancement.plugins {
        if plugin.name.is_empty() {
            return Err(Error::Config("plugin name cannot be empty".to_string()));
        }

        if !seen.insert(plugin.name.as_str()) {
            return Err(Error::Config(format!(
                "plugin '{}' is configured more than once",
                plugin.name
            )));
        }

        if !plugin.config.is_null() && !plugin.config.is_object() {
            return Err(Error::Config(format!(
                "plugin '{}' config must be a mapping",
                plugin.name
            )));
        }

        if !plugin.enabled {
            tracing::debug!(plugin = %plugin.name, "Plugin disabled in configuration");
        }
    }

    Ok(())
}

fn validate_observability(config: &Config) -> Result<()> {
    let logging = &config.observability.logging;

    if !LOG_LEVELS.contains(&logging.level().to_lowercase().as_str()) {
        return Err(Error::Config(format!(
            "Invalid log level: {} (must be one of {})",
            logging.level(),
            LOG_LEVELS.join(", ")
        )));
    }

    if !LOG_FORMATS.contains(&logging.format()) {
        return Err(Error::Config(format!(
            "Invalid log format: {} (must be text or json)",
            logging.format()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PluginConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_duplicate_plugin_rejected() {
        let mut config = Config::default();
        config.rpc_enhancement.plugins =
            vec![PluginConfig::new("metrics"), PluginConfig::new("metrics")];

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_empty_plugin_name_rejected() {
        let mut config = Config::default();
        config.rpc_enhancement.plugins = vec![PluginConfig::new("")];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_plugin_config_must_be_mapping() {
        let mut config = Config::default();
        let mut plugin = PluginConfig::new("metrics");
        plugin.config = serde_json::json!([1, 2]);
        config.rpc_enhancement.plugins = vec![plugin];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_logging() {
        let mut config = Config::default();
        config.observability.logging.level = Some("verbose".to_string());
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.observability.logging.format = Some("xml".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_disabled_reporter_is_not_an_error() {
        let mut config = Config::default();
        config.rpc_enhancement.reporter = Some("nope".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
