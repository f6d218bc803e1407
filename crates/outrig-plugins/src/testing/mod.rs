//! Testing utilities for plugin and adapter tests
//!
//! Enabled with the `testing` feature.

pub mod mocks;

pub use mocks::{CallLog, Invocation, RecordingPlugin};
