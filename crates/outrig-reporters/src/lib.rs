//! # Outrig Reference Reporters
//!
//! Enhancement plugins that ship with Outrig:
//! - [`CircuitBreakerReporter`] (post) tracks per-instance health
//! - [`TracingReporter`] (post) tags the call context and emits a trace event
//! - [`MetricsReporter`] (finally) aggregates per-service counters and latency
//!
//! [`build_registry`] assembles the reporters a [`Config`](outrig_config::Config)
//! enables into a [`PluginRegistry`](outrig_plugins::PluginRegistry).

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod circuit_breaker;
pub mod factory;
pub mod metrics;
pub mod trace;

pub use circuit_breaker::{
    BreakerMetrics, CircuitBreakerReporter, CircuitBreakerSettings, CircuitState,
};
pub use factory::{build_registry, build_reporters, Reporters, BUILTIN_PLUGINS};
pub use metrics::{MetricsReporter, MetricsSettings, MetricsSnapshot, ServiceMetrics};
pub use trace::{TracingReporter, TracingSettings};

/// Context attribute written by the circuit breaker reporter
pub const CIRCUIT_STATE_ATTR: &str = "circuit.state";

/// Context attribute holding the routed service id
pub const TRACE_SERVICE_ATTR: &str = "trace.service";

/// Context attribute holding the `host:port` of the routed instance
pub const TRACE_INSTANCE_ATTR: &str = "trace.instance";

/// Context attribute holding the status class (`2xx`, `5xx`, ...)
pub const TRACE_STATUS_CLASS_ATTR: &str = "trace.status_class";

/// Re-export commonly used types
pub mod prelude {
    pub use crate::circuit_breaker::{CircuitBreakerReporter, CircuitState};
    pub use crate::factory::build_registry;
    pub use crate::metrics::{MetricsReporter, MetricsSnapshot};
    pub use crate::trace::TracingReporter;
}
