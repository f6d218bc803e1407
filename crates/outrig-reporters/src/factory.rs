//! Registry assembly from configuration

use crate::circuit_breaker::{CircuitBreakerReporter, CircuitBreakerSettings};
use crate::metrics::{MetricsReporter, MetricsSettings};
use crate::trace::{TracingReporter, TracingSettings};
use outrig_config::{Config, PluginConfig};
use outrig_core::{Error, Result};
use outrig_plugins::{EnhancedPlugin, PluginRegistry};
use std::sync::Arc;
use tracing::debug;

/// Names accepted in `rpc_enhancement.plugins`
pub const BUILTIN_PLUGINS: [&str; 3] = [
    CircuitBreakerReporter::NAME,
    MetricsReporter::NAME,
    TracingReporter::NAME,
];

/// Registry plus handles to the stateful reporters it contains
///
/// Handles share state with the registered instances.
#[derive(Debug, Clone)]
pub struct Reporters {
    /// Assembled registry
    pub registry: PluginRegistry,
    /// Circuit breaker, when enabled
    pub circuit_breaker: Option<CircuitBreakerReporter>,
    /// Metrics reporter, when enabled
    pub metrics: Option<MetricsReporter>,
}

/// Build the registry for the reporters listed in `config`
///
/// Only listed, enabled plugins are registered. Unknown names and invalid
/// plugin settings are configuration errors.
pub fn build_registry(config: &Config) -> Result<PluginRegistry> {
    build_reporters(config).map(|reporters| reporters.registry)
}

/// Like [`build_registry`], also returning the stateful reporters
pub fn build_reporters(config: &Config) -> Result<Reporters> {
    let mut builder = PluginRegistry::builder();
    let mut circuit_breaker = None;
    let mut metrics = None;

    for entry in &config.rpc_enhancement.plugins {
        if !BUILTIN_PLUGINS.contains(&entry.name.as_str()) {
            return Err(Error::config(format!(
                "unknown plugin '{}', expected one of: {}",
                entry.name,
                BUILTIN_PLUGINS.join(", ")
            )));
        }

        if !entry.enabled {
            debug!(plugin = %entry.name, "Skipping disabled plugin");
            continue;
        }

        let plugin: Arc<dyn EnhancedPlugin> = match entry.name.as_str() {
            CircuitBreakerReporter::NAME => {
                let reporter =
                    CircuitBreakerReporter::new(CircuitBreakerSettings::from_value(&entry.config)?);
                circuit_breaker = Some(reporter.clone());
                Arc::new(reporter)
            }
            MetricsReporter::NAME => {
                let reporter = MetricsReporter::new(MetricsSettings::from_value(&entry.config)?);
                metrics = Some(reporter.clone());
                Arc::new(reporter)
            }
            _ => Arc::new(TracingReporter::new(TracingSettings::from_value(&entry.config)?)),
        };

        register(&mut builder, plugin, entry)?;
    }

    Ok(Reporters {
        registry: builder.build(),
        circuit_breaker,
        metrics,
    })
}

fn register(
    builder: &mut outrig_plugins::PluginRegistryBuilder,
    plugin: Arc<dyn EnhancedPlugin>,
    entry: &PluginConfig,
) -> Result<()> {
    match entry.order {
        Some(order) => builder.register_with_order(plugin, order),
        None => builder.register(plugin),
    }
}
