//! Mock plugins that record every invocation

use crate::error::{PluginError, Result};
use crate::traits::EnhancedPlugin;
use outrig_core::{CallContext, Stage};
use parking_lot::Mutex;
use std::sync::Arc;

/// One recorded plugin invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Plugin name
    pub plugin: String,
    /// Stage the plugin ran in
    pub stage: Stage,
    /// Context as the plugin saw it on entry
    pub context: CallContext,
}

/// Shared, ordered log of invocations across several plugins
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<Invocation>>>,
}

impl CallLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, invocation: Invocation) {
        self.entries.lock().push(invocation);
    }

    /// All invocations in the order they happened
    pub fn invocations(&self) -> Vec<Invocation> {
        self.entries.lock().clone()
    }

    /// Plugin names in the order they ran
    pub fn names(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|i| i.plugin.clone())
            .collect()
    }

    /// Number of recorded invocations
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if nothing ran
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeed,
    Fail,
    Panic,
}

/// Plugin that records each call and then succeeds, fails or panics
#[derive(Debug, Clone)]
pub struct RecordingPlugin {
    name: String,
    stage: Stage,
    order: i32,
    outcome: Outcome,
    log: CallLog,
}

impl RecordingPlugin {
    /// Create a plugin that succeeds
    pub fn new(name: impl Into<String>, stage: Stage, order: i32, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            stage,
            order,
            outcome: Outcome::Succeed,
            log: log.clone(),
        }
    }

    /// Return an error after recording
    pub fn failing(mut self) -> Self {
        self.outcome = Outcome::Fail;
        self
    }

    /// Panic after recording
    pub fn panicking(mut self) -> Self {
        self.outcome = Outcome::Panic;
        self
    }

    /// Wrap into the shared form the registry expects
    pub fn shared(self) -> Arc<dyn EnhancedPlugin> {
        Arc::new(self)
    }
}

impl EnhancedPlugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn run(&self, ctx: &mut CallContext) -> Result<()> {
        self.log.record(Invocation {
            plugin: self.name.clone(),
            stage: self.stage,
            context: ctx.clone(),
        });

        match self.outcome {
            Outcome::Succeed => Ok(()),
            Outcome::Fail => Err(PluginError::runtime(format!("{} failed", self.name))),
            Outcome::Panic => panic!("{} panicked", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_plugin() {
        let log = CallLog::new();
        let plugin = RecordingPlugin::new("rec", Stage::Post, 0, &log);

        let mut ctx = CallContext::new();
        plugin.run(&mut ctx).unwrap();

        assert_eq!(log.len(), 1);
        assert_eq!(log.names(), vec!["rec"]);
        assert_eq!(log.invocations()[0].stage, Stage::Post);
    }

    #[test]
    fn test_failing_plugin_still_records() {
        let log = CallLog::new();
        let plugin = RecordingPlugin::new("bad", Stage::Post, 0, &log).failing();

        assert!(plugin.run(&mut CallContext::new()).is_err());
        assert_eq!(log.len(), 1);
    }
}
