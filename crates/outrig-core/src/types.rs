//! Common types used throughout Outrig

use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed point in the lifecycle of an outbound call where plugins may run
///
/// Stages always occur in declaration order for a given call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Before the call is dispatched to the backend
    Pre,
    /// After a response or failure is available
    Post,
    /// Always attempted after [`Stage::Post`]
    Finally,
}

impl Stage {
    /// All stages in lifecycle order
    pub const ALL: [Stage; 3] = [Stage::Pre, Stage::Post, Stage::Finally];

    /// Lowercase stage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Pre => "pre",
            Stage::Post => "post",
            Stage::Finally => "finally",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The backend service instance an outbound call was sent to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Logical service id
    pub service_id: String,

    /// Host name or address of the instance
    pub host: String,

    /// Port of the instance (0 when unknown)
    pub port: u16,
}

impl ServiceInstance {
    /// Create a new service instance
    pub fn new(service_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            service_id: service_id.into(),
            host: host.into(),
            port,
        }
    }

    /// `host:port` key identifying this instance
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.service_id, self.host, self.port)
    }
}

/// Kind of abnormal call outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The backend did not answer in time
    Timeout,
    /// No connection could be established
    Connect,
    /// The backend answered with a protocol-level failure
    Upstream,
    /// Anything else
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Connect => write!(f, "connect"),
            FailureKind::Upstream => write!(f, "upstream"),
            FailureKind::Other => write!(f, "other"),
        }
    }
}

/// Captured failure of an outbound call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFailure {
    /// Failure kind
    pub kind: FailureKind,

    /// Human readable description
    pub message: String,
}

impl CallFailure {
    /// Create a new call failure
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
