//! # Outrig Plugin System
//!
//! Enhancement plugins observe the outcome of every outbound call:
//! - [`EnhancedPlugin`] is the capability a module implements (stage, order, run)
//! - [`PluginRegistry`] groups plugins by stage, sorted once at startup
//! - [`PluginRunner`] executes a stage against a call context, isolating failures
//!
//! ## Example
//!
//! ```rust
//! use outrig_core::{CallContext, Stage};
//! use outrig_plugins::{EnhancedPlugin, PluginError, PluginRegistry, PluginRunner};
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct StatusLogger;
//!
//! impl EnhancedPlugin for StatusLogger {
//!     fn name(&self) -> &str { "status-logger" }
//!     fn stage(&self) -> Stage { Stage::Post }
//!     fn run(&self, ctx: &mut CallContext) -> Result<(), PluginError> {
//!         println!("status: {:?}", ctx.response_status());
//!         Ok(())
//!     }
//! }
//!
//! let mut builder = PluginRegistry::builder();
//! builder.register(Arc::new(StatusLogger)).unwrap();
//! let runner = PluginRunner::new(Arc::new(builder.build()));
//!
//! let mut ctx = CallContext::new();
//! let report = runner.run(Stage::Post, &mut ctx);
//! assert_eq!(report.executed, 1);
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod registry;
pub mod runner;
pub mod traits;

#[cfg(feature = "testing")]
pub mod testing;

pub use error::PluginError;
pub use registry::{PluginRegistry, PluginRegistryBuilder, RegisteredPlugin};
pub use runner::{FailureReason, PluginFailure, PluginRunner, StageReport};
pub use traits::{EnhancedPlugin, PluginMetadata};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::PluginError;
    pub use crate::registry::{PluginRegistry, PluginRegistryBuilder};
    pub use crate::runner::{PluginRunner, StageReport};
    pub use crate::traits::{EnhancedPlugin, PluginMetadata};
    pub use outrig_core::{CallContext, Stage};
}
