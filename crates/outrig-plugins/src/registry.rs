//! Plugin registry
//!
//! Built once at startup and never mutated afterwards, so call threads read it
//! without locking.

use crate::traits::{EnhancedPlugin, PluginMetadata};
use outrig_core::{Error, Result, Stage};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// A plugin together with its effective execution order
#[derive(Clone)]
pub struct RegisteredPlugin {
    plugin: Arc<dyn EnhancedPlugin>,
    order: i32,
}

impl RegisteredPlugin {
    /// The plugin instance
    pub fn plugin(&self) -> &Arc<dyn EnhancedPlugin> {
        &self.plugin
    }

    /// Effective execution order (may differ from the plugin's own)
    pub fn order(&self) -> i32 {
        self.order
    }

    /// Plugin name
    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    /// Metadata with the effective order
    pub fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            order: self.order,
            ..self.plugin.metadata()
        }
    }
}

impl fmt::Debug for RegisteredPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredPlugin")
            .field("name", &self.plugin.name())
            .field("stage", &self.plugin.stage())
            .field("order", &self.order)
            .finish()
    }
}

/// Collects plugins at startup and freezes them into a [`PluginRegistry`]
#[derive(Debug, Default)]
pub struct PluginRegistryBuilder {
    entries: Vec<RegisteredPlugin>,
    names: HashSet<String>,
}

impl PluginRegistryBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin using its own execution order
    pub fn register(&mut self, plugin: Arc<dyn EnhancedPlugin>) -> Result<()> {
        let order = plugin.order();
        self.register_with_order(plugin, order)
    }

    /// Register a plugin with an explicit execution order
    pub fn register_with_order(
        &mut self,
        plugin: Arc<dyn EnhancedPlugin>,
        order: i32,
    ) -> Result<()> {
        let name = plugin.name().to_string();

        if !self.names.insert(name.clone()) {
            return Err(Error::plugin(name, "Plugin already registered"));
        }

        tracing::info!(plugin = %name, stage = %plugin.stage(), order, "Plugin registered");

        self.entries.push(RegisteredPlugin { plugin, order });
        Ok(())
    }

    /// Number of plugins registered so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Group plugins by stage and sort each group by order
    ///
    /// The sort is stable: plugins with equal order keep registration order.
    pub fn build(self) -> PluginRegistry {
        let mut stages: HashMap<Stage, Vec<RegisteredPlugin>> = HashMap::new();

        for entry in self.entries {
            stages.entry(entry.plugin.stage()).or_default().push(entry);
        }

        for plugins in stages.values_mut() {
            plugins.sort_by_key(RegisteredPlugin::order);
        }

        PluginRegistry { stages }
    }
}

/// Immutable mapping from stage to its ordered plugins
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    stages: HashMap<Stage, Vec<RegisteredPlugin>>,
}

impl PluginRegistry {
    /// Start building a registry
    pub fn builder() -> PluginRegistryBuilder {
        PluginRegistryBuilder::new()
    }

    /// A registry without plugins
    pub fn empty() -> Self {
        Self::default()
    }

    /// Plugins of `stage` in execution order
    pub fn plugins(&self, stage: Stage) -> &[RegisteredPlugin] {
        self.stages
            .get(&stage)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Total plugin count
    pub fn len(&self) -> usize {
        self.stages.values().map(Vec::len).sum()
    }

    /// Check if the registry holds no plugins
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every plugin in lifecycle order, then execution order
    pub fn plan(&self) -> Vec<PluginMetadata> {
        Stage::ALL
            .iter()
            .flat_map(|stage| self.plugins(*stage))
            .map(RegisteredPlugin::metadata)
            .collect()
    }
}
