//! Trace tagging for completed calls

use crate::{TRACE_INSTANCE_ATTR, TRACE_SERVICE_ATTR, TRACE_STATUS_CLASS_ATTR};
use outrig_core::{CallContext, Error, Stage};
use outrig_plugins::{EnhancedPlugin, PluginError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

/// Prefix of attributes holding copied response headers
pub const TRACE_HEADER_ATTR_PREFIX: &str = "trace.header.";

/// Tracing reporter settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracingSettings {
    /// Response headers copied into `trace.header.<name>` attributes
    pub headers: Vec<String>,
}

impl TracingSettings {
    /// Parse settings from a plugin `config` value; `null` means defaults
    pub fn from_value(value: &serde_json::Value) -> outrig_core::Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(value)
            .map_err(|e| Error::config(format!("{}: {}", TracingReporter::NAME, e)))
    }
}

/// Post-stage plugin that tags the context and logs one event per call
///
/// Runs early in the post stage so later plugins can read its attributes.
/// Missing facts are left out of the event rather than reported as errors.
#[derive(Debug, Clone, Default)]
pub struct TracingReporter {
    settings: TracingSettings,
}

impl TracingReporter {
    /// Registry name
    pub const NAME: &'static str = "tracing";

    /// Create a reporter with the given settings
    pub fn new(settings: TracingSettings) -> Self {
        Self { settings }
    }

    fn copy_headers(&self, ctx: &mut CallContext) {
        let Some(headers) = ctx.response_headers() else {
            return;
        };

        // Header names are matched case-insensitively
        let copied: Vec<(String, serde_json::Value)> = self
            .settings
            .headers
            .iter()
            .filter_map(|wanted| {
                let (_, values) = headers
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(wanted))?;
                let key = format!("{}{}", TRACE_HEADER_ATTR_PREFIX, wanted.to_ascii_lowercase());
                Some((key, json!(values)))
            })
            .collect();

        for (key, value) in copied {
            ctx.set_attribute(key, value);
        }
    }
}

/// `2xx`, `5xx`, ...
fn status_class(status: u16) -> String {
    format!("{}xx", status / 100)
}

impl EnhancedPlugin for TracingReporter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn stage(&self) -> Stage {
        Stage::Post
    }

    fn order(&self) -> i32 {
        -100
    }

    fn run(&self, ctx: &mut CallContext) -> Result<(), PluginError> {
        if let Some(instance) = ctx.target_service().cloned() {
            ctx.set_attribute(TRACE_SERVICE_ATTR, json!(instance.service_id));
            ctx.set_attribute(TRACE_INSTANCE_ATTR, json!(instance.authority()));
        }
        if let Some(status) = ctx.response_status() {
            ctx.set_attribute(TRACE_STATUS_CLASS_ATTR, json!(status_class(status)));
        }
        self.copy_headers(ctx);

        info!(
            service = ctx.target_service().map(|i| i.service_id.as_str()),
            instance = ctx.target_service().map(|i| i.authority()),
            status = ctx.response_status(),
            delay_ms = ctx.elapsed_delay().map(|d| d.num_milliseconds()),
            failure = ctx.failure().map(|f| f.to_string()),
            "Outbound call completed"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outrig_core::{ResponseSnapshot, ServiceInstance};

    fn context() -> CallContext {
        let mut ctx = CallContext::new();
        ctx.set_target_service(ServiceInstance::new("svc-a", "10.0.0.1", 8080));
        ctx.set_response(ResponseSnapshot::from_pairs(
            503,
            [
                ("X-Request-Id", "abc"),
                ("Retry-After", "5"),
                ("X-Request-Id", "def"),
            ],
        ));
        ctx
    }

    #[test]
    fn test_tags_context() {
        let mut ctx = context();
        TracingReporter::default().run(&mut ctx).unwrap();

        assert_eq!(ctx.attribute(TRACE_SERVICE_ATTR), Some(&json!("svc-a")));
        assert_eq!(
            ctx.attribute(TRACE_INSTANCE_ATTR),
            Some(&json!("10.0.0.1:8080"))
        );
        assert_eq!(ctx.attribute(TRACE_STATUS_CLASS_ATTR), Some(&json!("5xx")));
    }

    #[test]
    fn test_copies_configured_headers() {
        let value = json!({"headers": ["x-request-id", "x-missing"]});
        let settings = TracingSettings::from_value(&value).unwrap();
        let mut ctx = context();

        TracingReporter::new(settings).run(&mut ctx).unwrap();

        assert_eq!(
            ctx.attribute("trace.header.x-request-id"),
            Some(&json!(["abc", "def"]))
        );
        assert!(ctx.attribute("trace.header.x-missing").is_none());
        assert!(ctx.attribute("trace.header.retry-after").is_none());
    }

    #[test]
    fn test_tolerates_empty_context() {
        let mut ctx = CallContext::new();
        TracingReporter::default().run(&mut ctx).unwrap();
        assert!(ctx.attributes().is_empty());
    }

    #[test]
    fn test_status_class() {
        assert_eq!(status_class(200), "2xx");
        assert_eq!(status_class(404), "4xx");
        assert_eq!(status_class(503), "5xx");
    }

    #[test]
    fn test_settings_reject_unknown_fields() {
        assert!(TracingSettings::from_value(&json!({"level": "debug"})).is_err());
    }
}
