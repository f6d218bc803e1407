//! Configuration types

use serde::{Deserialize, Deserializer, Serialize};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Enhancement pipeline settings
    #[serde(default)]
    pub rpc_enhancement: RpcEnhancementConfig,

    /// Observability
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Enhancement pipeline settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RpcEnhancementConfig {
    /// Reporter switch, kept verbatim as a string
    ///
    /// Absent or empty means enabled, `"true"` means enabled, anything else
    /// disables the post/finally stages for every call.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub reporter: Option<String>,

    /// Run pre-stage plugins from the pre-dispatch hook
    ///
    /// `None` means the file did not say, which keeps the value of an
    /// earlier layer when merging and reads as off otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_stage_plugins: Option<bool>,

    /// Enhancement plugins to register at startup
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
}

impl RpcEnhancementConfig {
    /// Effective pre-stage switch
    pub fn pre_stage_plugins_enabled(&self) -> bool {
        self.pre_stage_plugins.unwrap_or(false)
    }
}

/// Plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginConfig {
    /// Plugin name
    pub name: String,

    /// Enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Execution order override (lower runs first)
    #[serde(default)]
    pub order: Option<i32>,

    /// Plugin specific settings
    #[serde(default)]
    pub config: serde_json::Value,
}

impl PluginConfig {
    /// Enabled plugin entry with default settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            order: None,
            config: serde_json::Value::Null,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
///
/// Unset fields fall back to `info` and `text`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Log format (json, text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl LoggingConfig {
    /// Default log level
    pub const DEFAULT_LEVEL: &'static str = "info";

    /// Default log format
    pub const DEFAULT_FORMAT: &'static str = "text";

    /// Fully specified logging settings
    pub fn new(level: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            level: Some(level.into()),
            format: Some(format.into()),
        }
    }

    /// Effective log level
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or(Self::DEFAULT_LEVEL)
    }

    /// Effective log format
    pub fn format(&self) -> &str {
        self.format.as_deref().unwrap_or(Self::DEFAULT_FORMAT)
    }
}

fn default_enabled() -> bool {
    true
}

/// Accept any scalar for the reporter flag and keep its textual form
///
/// YAML and TOML users write `reporter: false` as often as
/// `reporter: "false"`; both must end up as the same string.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }))
}
