//! # Outrig
//!
//! Staged enhancement pipeline for API gateway outbound calls.
//!
//! Every outbound call gets a [`CallContext`](model::CallContext). Once the
//! call completes, the gateway's filter chain hands its per-call state to a
//! [`StageAdapter`](gateway::StageAdapter), which fills in the context and runs
//! the registered plugins of the post stage and then the finally stage.
//!
//! ```rust
//! use outrig::prelude::*;
//! use std::sync::Arc;
//!
//! let config = outrig::config::ConfigBuilder::new()
//!     .plugin(outrig::config::PluginConfig::new("metrics"))
//!     .build()
//!     .unwrap();
//! let reporters = outrig::reporters::build_reporters(&config).unwrap();
//!
//! let runner = PluginRunner::new(Arc::new(reporters.registry));
//! let adapter = StageAdapter::new(runner, Arc::new(config));
//!
//! let mut state = CallState::new();
//! adapter.pre_dispatch(&mut state);
//! state.insert(
//!     keys::UPSTREAM_RESPONSE,
//!     UpstreamResponse::new(200, "http://10.0.0.1:8080/".parse().unwrap()),
//! );
//!
//! assert!(adapter.post_dispatch(&mut state).is_executed());
//! assert_eq!(reporters.metrics.unwrap().total_requests(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub use outrig_config as config;
pub use outrig_core as model;
pub use outrig_gateway as gateway;
pub use outrig_plugins as plugins;
pub use outrig_reporters as reporters;

/// Re-export commonly used types
pub mod prelude {
    pub use outrig_config::{Config, PropertySource};
    pub use outrig_core::{CallContext, ServiceInstance, Stage};
    pub use outrig_gateway::{keys, AdapterOutcome, CallState, StageAdapter, UpstreamResponse};
    pub use outrig_plugins::{EnhancedPlugin, PluginError, PluginRegistry, PluginRunner};
}
