//! Error types for Outrig

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for Outrig
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Plugin error
    #[error("Plugin error in '{plugin}': {message}")]
    Plugin {
        /// Plugin name
        plugin: String,
        /// Error message
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a plugin error
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_error() {
        let err = Error::plugin("circuit-breaker", "no target instance");
        assert!(matches!(err, Error::Plugin { .. }));
        assert!(err.to_string().contains("circuit-breaker"));
    }

    #[test]
    fn test_config_error_display() {
        let err = Error::config("bad level");
        assert_eq!(err.to_string(), "Configuration error: bad level");
    }
}
