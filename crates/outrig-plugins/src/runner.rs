//! Stage runner
//!
//! Executes every plugin of one stage against a call context, strictly in
//! order. A plugin that returns an error or panics is logged and recorded in
//! the [`StageReport`]; the remaining plugins still run and nothing is
//! propagated to the caller.

use crate::registry::PluginRegistry;
use outrig_core::{CallContext, Stage};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Why a plugin failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The plugin returned an error
    Error(String),
    /// The plugin panicked
    Panic(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Error(msg) => write!(f, "error: {}", msg),
            FailureReason::Panic(msg) => write!(f, "panic: {}", msg),
        }
    }
}

/// A single isolated plugin failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFailure {
    /// Plugin name
    pub plugin: String,
    /// Failure reason
    pub reason: FailureReason,
}

/// Outcome of running one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    /// Stage that ran
    pub stage: Stage,
    /// Number of plugins invoked
    pub executed: usize,
    /// Plugins that failed, in execution order
    pub failures: Vec<PluginFailure>,
}

impl StageReport {
    fn new(stage: Stage) -> Self {
        Self {
            stage,
            executed: 0,
            failures: Vec::new(),
        }
    }

    /// Check if every invoked plugin succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of failed plugins
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Runs the plugins of a stage from an injected registry
#[derive(Debug, Clone)]
pub struct PluginRunner {
    registry: Arc<PluginRegistry>,
}

impl PluginRunner {
    /// Create a runner over a registry
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this runner reads from
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Run every plugin of `stage` against `ctx`
    ///
    /// Never fails. Later plugins observe writes made by earlier ones.
    pub fn run(&self, stage: Stage, ctx: &mut CallContext) -> StageReport {
        let mut report = StageReport::new(stage);
        let plugins = self.registry.plugins(stage);

        if plugins.is_empty() {
            return report;
        }

        for entry in plugins {
            let plugin = entry.plugin();
            report.executed += 1;

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| plugin.run(ctx)));

            let reason = match outcome {
                Ok(Ok(())) => {
                    debug!(plugin = %plugin.name(), stage = %stage, "Plugin completed");
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(plugin = %plugin.name(), stage = %stage, error = %e, "Plugin failed");
                    FailureReason::Error(e.to_string())
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(
                        plugin = %plugin.name(),
                        stage = %stage,
                        panic = %message,
                        "Plugin panicked"
                    );
                    FailureReason::Panic(message)
                }
            };

            report.failures.push(PluginFailure {
                plugin: plugin.name().to_string(),
                reason,
            });
        }

        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
