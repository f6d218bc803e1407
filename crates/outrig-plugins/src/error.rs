//! Plugin error types

use std::fmt;

/// Error a plugin signals from [`run`](crate::EnhancedPlugin::run)
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// A fact the plugin depends on is missing from the call context
    #[error("Missing fact: {0}")]
    MissingFact(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// Error raised by shared Outrig code
    #[error(transparent)]
    Core(#[from] outrig_core::Error),
}

/// Result type for plugin operations
pub type Result<T> = std::result::Result<T, PluginError>;

impl PluginError {
    /// Create a new missing fact error
    pub fn missing(fact: impl fmt::Display) -> Self {
        Self::MissingFact(fact.to_string())
    }

    /// Create a new runtime error
    pub fn runtime(msg: impl fmt::Display) -> Self {
        Self::RuntimeError(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        assert!(matches!(PluginError::missing("target"), PluginError::MissingFact(_)));
        assert!(matches!(PluginError::runtime("boom"), PluginError::RuntimeError(_)));
    }

    #[test]
    fn test_error_display() {
        let err = PluginError::missing("response status");
        assert_eq!(err.to_string(), "Missing fact: response status");

        let err: PluginError = outrig_core::Error::config("bad").into();
        assert_eq!(err.to_string(), "Configuration error: bad");
    }
}
