//! # Outrig Gateway Integration
//!
//! The stage adapter is what a gateway's filter chain calls around each
//! outbound request:
//! - [`StageAdapter::pre_dispatch`] before the request leaves the gateway
//! - [`StageAdapter::post_dispatch`] once a response (or failure) is known
//!
//! Facts travel between the two hooks in the chain's own per-call
//! [`CallState`], which also owns the call's [`CallContext`](outrig_core::CallContext).

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod adapter;
pub mod clock;
pub mod state;
pub mod upstream;

pub use adapter::{AdapterOutcome, SkipReason, StageAdapter};
pub use clock::{Clock, ManualClock, SystemClock};
pub use state::{keys, CallState};
pub use upstream::UpstreamResponse;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::adapter::{AdapterOutcome, StageAdapter};
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::state::{keys, CallState};
    pub use crate::upstream::UpstreamResponse;
}
