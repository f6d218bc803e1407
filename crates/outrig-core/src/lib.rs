//! # Outrig Core
//!
//! Core types shared by every part of the Outrig enhancement pipeline:
//! - The call-scoped [`CallContext`] that plugins read and enrich
//! - The fixed call-lifecycle [`Stage`]s
//! - Response snapshots and the contacted [`ServiceInstance`]
//! - Error types

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod context;
pub mod error;
pub mod response;
pub mod types;

pub use context::CallContext;
pub use error::{Error, Result};
pub use response::{Headers, ResponseSnapshot};
pub use types::{CallFailure, FailureKind, ServiceInstance, Stage};

// Re-export the time types used on the context surface
pub use chrono::{DateTime, TimeDelta, Utc};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::context::CallContext;
    pub use crate::error::{Error, Result};
    pub use crate::response::{Headers, ResponseSnapshot};
    pub use crate::types::{CallFailure, FailureKind, ServiceInstance, Stage};
}
