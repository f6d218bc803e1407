//! Completed-response artifact written by the gateway's routing filter

use http::{HeaderMap, StatusCode};
use outrig_core::ResponseSnapshot;
use url::Url;

/// What the routing filter knows once a backend has answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    /// HTTP status code
    pub status: u16,

    /// Header pairs in the order they were received
    pub headers: Vec<(String, String)>,

    /// URI the request was actually sent to
    pub requested_uri: Url,

    /// Service id, when the transport knows it
    pub service_id: Option<String>,
}

impl UpstreamResponse {
    /// Create a response artifact without headers
    pub fn new(status: u16, requested_uri: Url) -> Self {
        Self {
            status,
            headers: Vec::new(),
            requested_uri,
            service_id: None,
        }
    }

    /// Build from `http` types
    ///
    /// `HeaderMap` lowercases names, so names arrive lowercase on this path.
    /// Values that are not valid UTF-8 are converted lossily.
    pub fn from_http(status: StatusCode, headers: &HeaderMap, requested_uri: Url) -> Self {
        let headers = headers
            .iter()
            .map(|(name, value)| {
                let value = match value.to_str() {
                    Ok(v) => v.to_string(),
                    Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
                };
                (name.as_str().to_string(), value)
            })
            .collect();

        Self {
            status: status.as_u16(),
            headers,
            requested_uri,
            service_id: None,
        }
    }

    /// Append a header pair
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the service id
    pub fn service_id(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self
    }

    /// Host of the requested URI, empty when the URI has none
    pub fn host(&self) -> &str {
        self.requested_uri.host_str().unwrap_or_default()
    }

    /// Port of the requested URI, falling back to the scheme default, else 0
    pub fn port(&self) -> u16 {
        self.requested_uri.port_or_known_default().unwrap_or(0)
    }

    /// Status and grouped headers as a context snapshot
    pub fn snapshot(&self) -> ResponseSnapshot {
        ResponseSnapshot::from_pairs(
            self.status,
            self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str())),
        )
    }
}
