//! Configuration file merging
//!
//! Later files override earlier files, allowing for layered configuration:
//! - base.yaml (shared plugin set)
//! - environment.yaml (env-specific switches)
//! - local.yaml (developer overrides)

use crate::types::{Config, LoggingConfig, PluginConfig, RpcEnhancementConfig};
use outrig_core::Result;

/// Merge multiple configurations together
///
/// Later configs override earlier configs. Plugin lists are merged by name.
pub fn merge_configs(configs: Vec<Config>) -> Result<Config> {
    let mut configs = configs.into_iter();
    let Some(mut result) = configs.next() else {
        return Err(outrig_core::Error::Config("No configurations to merge".to_string()));
    };

    for config in configs {
        result = merge_two_configs(result, config);
    }

    Ok(result)
}

/// Merge two configurations
fn merge_two_configs(mut base: Config, overlay: Config) -> Config {
    base.rpc_enhancement = merge_enhancement(base.rpc_enhancement, overlay.rpc_enhancement);
    base.observability.logging =
        merge_logging(base.observability.logging, overlay.observability.logging);
    base
}

/// Fields the overlay leaves unset keep the base value
fn merge_enhancement(
    base: RpcEnhancementConfig,
    overlay: RpcEnhancementConfig,
) -> RpcEnhancementConfig {
    RpcEnhancementConfig {
        reporter: overlay.reporter.or(base.reporter),
        pre_stage_plugins: overlay.pre_stage_plugins.or(base.pre_stage_plugins),
        plugins: merge_plugins(base.plugins, overlay.plugins),
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    LoggingConfig {
        level: overlay.level.or(base.level),
        format: overlay.format.or(base.format),
    }
}

/// Merge plugins by name
///
/// Existing entries are replaced in place so registration order stays stable;
/// new entries are appended.
fn merge_plugins(mut base: Vec<PluginConfig>, overlay: Vec<PluginConfig>) -> Vec<PluginConfig> {
    for plugin in overlay {
        match base.iter_mut().find(|p| p.name == plugin.name) {
            Some(existing) => *existing = plugin,
            None => base.push(plugin),
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObservabilityConfig;

    fn create_test_config(reporter: Option<&str>, plugins: &[&str]) -> Config {
        Config {
            rpc_enhancement: RpcEnhancementConfig {
                reporter: reporter.map(str::to_string),
                pre_stage_plugins: None,
                plugins: plugins
                    .iter()
                    .map(|name| PluginConfig::new(*name))
                    .collect(),
            },
            observability: ObservabilityConfig::default(),
        }
    }

    #[test]
    fn test_merge_two_configs() {
        let base = create_test_config(Some("true"), &[]);
        let mut overlay = create_test_config(Some("false"), &[]);
        overlay.observability.logging = LoggingConfig::new("debug", "json");

        let merged = merge_two_configs(base, overlay);

        assert_eq!(merged.rpc_enhancement.reporter.as_deref(), Some("false"));
        assert_eq!(merged.observability.logging.level(), "debug");
        assert_eq!(merged.observability.logging.format(), "json");
    }

    #[test]
    fn test_unset_overlay_fields_keep_base() {
        let mut base = create_test_config(None, &[]);
        base.rpc_enhancement.pre_stage_plugins = Some(true);
        base.observability.logging = LoggingConfig::new("debug", "json");
        let mut overlay = create_test_config(None, &[]);
        overlay.observability.logging.level = Some("warn".to_string());

        let merged = merge_two_configs(base, overlay);

        assert_eq!(merged.rpc_enhancement.pre_stage_plugins, Some(true));
        assert_eq!(merged.observability.logging.level(), "warn");
        assert_eq!(merged.observability.logging.format(), "json");
    }

    #[test]
    fn test_later_layer_can_turn_pre_stage_off() {
        let mut base = create_test_config(None, &[]);
        base.rpc_enhancement.pre_stage_plugins = Some(true);
        let mut overlay = create_test_config(None, &[]);
        overlay.rpc_enhancement.pre_stage_plugins = Some(false);

        let merged = merge_two_configs(base, overlay);

        assert!(!merged.rpc_enhancement.pre_stage_plugins_enabled());
    }

    #[test]
    fn test_unset_reporter_keeps_base() {
        let base = create_test_config(Some("false"), &[]);
        let overlay = create_test_config(None, &[]);

        let merged = merge_two_configs(base, overlay);
        assert_eq!(merged.rpc_enhancement.reporter.as_deref(), Some("false"));
    }

    #[test]
    fn test_merge_plugins_keeps_order() {
        let base = vec![PluginConfig::new("tracing"), PluginConfig::new("metrics")];
        let mut disabled_tracing = PluginConfig::new("tracing");
        disabled_tracing.enabled = false;
        let overlay = vec![PluginConfig::new("circuit-breaker"), disabled_tracing];

        let merged = merge_plugins(base, overlay);

        let names: Vec<&str> = merged.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["tracing", "metrics", "circuit-breaker"]);
        assert!(!merged[0].enabled);
    }

    #[test]
    fn test_merge_multiple_configs() {
        let merged = merge_configs(vec![
            create_test_config(None, &["tracing"]),
            create_test_config(Some("true"), &["metrics"]),
            create_test_config(Some("off"), &[]),
        ])
        .unwrap();

        assert_eq!(merged.rpc_enhancement.reporter.as_deref(), Some("off"));
        assert_eq!(merged.rpc_enhancement.plugins.len(), 2);
    }

    #[test]
    fn test_merge_empty_configs() {
        assert!(merge_configs(vec![]).is_err());
    }
}
