//! Call-scoped context shared by every plugin stage of one outbound call

use crate::response::{Headers, ResponseSnapshot};
use crate::types::{CallFailure, ServiceInstance};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;

/// Facts accumulated about a single in-flight outbound call
///
/// A context is created at most once per call and handed to every stage of
/// that call by mutable reference. It is a passive fact base: setters only
/// store values, nothing is validated, and nothing is ever rolled back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallContext {
    target_service: Option<ServiceInstance>,
    request_started_at: Option<DateTime<Utc>>,
    response: Option<ResponseSnapshot>,
    elapsed_delay: Option<TimeDelta>,
    failure: Option<CallFailure>,
    attributes: HashMap<String, serde_json::Value>,
}

impl CallContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend instance that served the call
    pub fn target_service(&self) -> Option<&ServiceInstance> {
        self.target_service.as_ref()
    }

    /// Record the backend instance that served the call
    pub fn set_target_service(&mut self, instance: ServiceInstance) {
        self.target_service = Some(instance);
    }

    /// Timestamp captured before dispatch
    pub fn request_started_at(&self) -> Option<DateTime<Utc>> {
        self.request_started_at
    }

    /// Record the dispatch timestamp
    pub fn set_request_started_at(&mut self, started_at: DateTime<Utc>) {
        self.request_started_at = Some(started_at);
    }

    /// Snapshot of the completed response
    pub fn response(&self) -> Option<&ResponseSnapshot> {
        self.response.as_ref()
    }

    /// Record the completed response
    pub fn set_response(&mut self, response: ResponseSnapshot) {
        self.response = Some(response);
    }

    /// Status code of the completed response
    pub fn response_status(&self) -> Option<u16> {
        self.response.as_ref().map(ResponseSnapshot::status)
    }

    /// Headers of the completed response
    pub fn response_headers(&self) -> Option<&Headers> {
        self.response.as_ref().map(ResponseSnapshot::headers)
    }

    /// Time between dispatch and the post stage
    ///
    /// Negative only when the caller supplied inconsistent timestamps.
    pub fn elapsed_delay(&self) -> Option<TimeDelta> {
        self.elapsed_delay
    }

    /// Record the elapsed delay
    pub fn set_elapsed_delay(&mut self, delay: TimeDelta) {
        self.elapsed_delay = Some(delay);
    }

    /// Abnormal outcome of the call, if any
    pub fn failure(&self) -> Option<&CallFailure> {
        self.failure.as_ref()
    }

    /// Record an abnormal outcome
    pub fn set_failure(&mut self, failure: CallFailure) {
        self.failure = Some(failure);
    }

    /// Set an enrichment attribute for plugins later in the pipeline
    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
    }

    /// Get an enrichment attribute
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// All enrichment attributes
    pub fn attributes(&self) -> &HashMap<String, serde_json::Value> {
        &self.attributes
    }
}
