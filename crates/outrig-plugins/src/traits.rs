//! Plugin capability and metadata

use crate::error::Result;
use outrig_core::{CallContext, Stage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability every enhancement module implements to take part in a stage
///
/// The same instance serves every call concurrently, so implementations
/// must not keep unguarded mutable state.
pub trait EnhancedPlugin: Send + Sync + fmt::Debug {
    /// Plugin name (must be unique within a registry)
    fn name(&self) -> &str;

    /// Stage this plugin runs in
    fn stage(&self) -> Stage;

    /// Execution order within the stage, lower runs first
    fn order(&self) -> i32 {
        0
    }

    /// Observe or enrich the call context
    ///
    /// Errors are isolated by the runner and never reach the gateway.
    fn run(&self, ctx: &mut CallContext) -> Result<()>;

    /// Get plugin metadata
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: self.name().to_string(),
            stage: self.stage(),
            order: self.order(),
        }
    }
}

/// Plugin metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Plugin name
    pub name: String,

    /// Stage affinity
    pub stage: Stage,

    /// Effective execution order
    pub order: i32,
}

impl fmt::Display for PluginMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<8} {:>6}  {}", self.stage, self.order, self.name)
    }
}
