//! Response snapshot captured from a completed outbound call

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Response headers: name (case as received) to values, both in received order
pub type Headers = IndexMap<String, Vec<String>>;

/// Immutable view of a completed response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    status: u16,
    headers: Headers,
}

impl ResponseSnapshot {
    /// Create a snapshot from a status code and header set
    pub fn new(status: u16, headers: Headers) -> Self {
        Self { status, headers }
    }

    /// Group `(name, value)` pairs into a snapshot, keeping every value
    ///
    /// Repeated names accumulate their values in the order they appear.
    pub fn from_pairs<I, K, V>(status: u16, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut headers = Headers::new();
        for (name, value) in pairs {
            headers.entry(name.into()).or_default().push(value.into());
        }
        Self { status, headers }
    }

    /// HTTP status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// All response headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Values of a single header, exact name match
    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.headers.get(name).map(Vec::as_slice)
    }

    /// Check if response was successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response was a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if response was a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}
