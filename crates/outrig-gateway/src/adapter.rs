//! Stage adapter
//!
//! Bridges the gateway chain's per-call state to the call context and the
//! plugin runner. Nothing in here returns an error: a call that lacks the
//! facts needed for enhancement is skipped, and plugin failures stay inside
//! the runner.

use crate::clock::{Clock, SystemClock};
use crate::state::{keys, CallState};
use crate::upstream::UpstreamResponse;
use chrono::{DateTime, Utc};
use outrig_config::{is_reporter_enabled, PropertySource, PRE_STAGE_PLUGINS_KEY};
use outrig_core::{CallContext, CallFailure, ServiceInstance, Stage};
use outrig_plugins::{PluginRunner, StageReport};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Why a call was not enhanced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No usable pre-dispatch timestamp in the call state
    MissingStartTime,
    /// No usable completed response in the call state
    MissingResponse,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingStartTime => write!(f, "missing start time"),
            SkipReason::MissingResponse => write!(f, "missing upstream response"),
        }
    }
}

/// Result of the post-dispatch hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterOutcome {
    /// The reporter flag is off
    Disabled,
    /// The call is not eligible for enhancement
    Skipped(SkipReason),
    /// Post and finally stages ran
    Executed {
        /// Report of the post stage
        post: StageReport,
        /// Report of the finally stage
        finally: StageReport,
    },
}

impl AdapterOutcome {
    /// Check if the plugin stages ran
    pub fn is_executed(&self) -> bool {
        matches!(self, AdapterOutcome::Executed { .. })
    }
}

/// Integration point invoked by the gateway's filter chain
pub struct StageAdapter {
    runner: PluginRunner,
    properties: Arc<dyn PropertySource>,
    clock: Arc<dyn Clock>,
}

impl StageAdapter {
    /// Create an adapter reading switches from `properties`
    pub fn new(runner: PluginRunner, properties: Arc<dyn PropertySource>) -> Self {
        Self {
            runner,
            properties,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for timestamps and delays
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The runner used for every stage
    pub fn runner(&self) -> &PluginRunner {
        &self.runner
    }

    /// Whether post/finally stages currently run
    pub fn is_enabled(&self) -> bool {
        is_reporter_enabled(self.properties.as_ref())
    }

    fn pre_stage_enabled(&self) -> bool {
        self.properties.property(PRE_STAGE_PLUGINS_KEY).as_deref() == Some("true")
    }

    /// Hook called right before the request is dispatched
    ///
    /// Records the start time (unless the chain already did) and creates the
    /// call context. Pre-stage plugins run only when
    /// `rpc_enhancement.pre_stage_plugins` is `"true"`.
    pub fn pre_dispatch(&self, state: &mut CallState) -> Option<StageReport> {
        let started_at = match state.try_get::<DateTime<Utc>>(keys::PRE_ROUTE_TIME) {
            Some(started_at) => *started_at,
            None => {
                let now = self.clock.now();
                state.insert(keys::PRE_ROUTE_TIME, now);
                now
            }
        };

        let ctx = context_slot(state)?;
        ctx.set_request_started_at(started_at);

        if !self.pre_stage_enabled() {
            return None;
        }

        Some(self.runner.run(Stage::Pre, ctx))
    }

    /// Hook called once the call has completed
    ///
    /// Runs the post stage and then, unconditionally, the finally stage when
    /// both a start time and a completed response are present. Otherwise the
    /// call state is left untouched.
    pub fn post_dispatch(&self, state: &mut CallState) -> AdapterOutcome {
        if !self.is_enabled() {
            return AdapterOutcome::Disabled;
        }

        let started_at: Option<DateTime<Utc>> = state.try_get(keys::PRE_ROUTE_TIME).copied();
        let Some(started_at) = started_at else {
            debug!(reason = %SkipReason::MissingStartTime, "Skipping enhancement");
            return AdapterOutcome::Skipped(SkipReason::MissingStartTime);
        };

        let Some(response) = state.try_get::<UpstreamResponse>(keys::UPSTREAM_RESPONSE) else {
            debug!(reason = %SkipReason::MissingResponse, "Skipping enhancement");
            return AdapterOutcome::Skipped(SkipReason::MissingResponse);
        };

        let snapshot = response.snapshot();
        let service_id = state
            .try_get::<String>(keys::SERVICE_ID)
            .cloned()
            .or_else(|| response.service_id.clone())
            .unwrap_or_default();
        let instance = ServiceInstance::new(service_id, response.host(), response.port());
        let failure = state.try_get::<CallFailure>(keys::CALL_FAILURE).cloned();
        let delay = self.clock.now() - started_at;

        let Some(ctx) = context_slot(state) else {
            return AdapterOutcome::Skipped(SkipReason::MissingResponse);
        };

        ctx.set_request_started_at(started_at);
        ctx.set_response(snapshot);
        ctx.set_elapsed_delay(delay);
        ctx.set_target_service(instance);
        if let Some(failure) = failure {
            ctx.set_failure(failure);
        }

        debug!(
            instance = ?ctx.target_service(),
            status = ?ctx.response_status(),
            delay_ms = delay.num_milliseconds(),
            "Running enhanced plugins"
        );

        let post = self.runner.run(Stage::Post, ctx);
        let finally = self.runner.run(Stage::Finally, ctx);

        AdapterOutcome::Executed { post, finally }
    }
}

impl fmt::Debug for StageAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageAdapter")
            .field("runner", &self.runner)
            .field("properties", &self.properties)
            .finish()
    }
}

/// The call's context, created on first use
///
/// A slot holding anything other than a context is replaced.
fn context_slot(state: &mut CallState) -> Option<&mut CallContext> {
    if state.try_get::<CallContext>(keys::CALL_CONTEXT).is_none() {
        state.insert(keys::CALL_CONTEXT, CallContext::new());
    }
    state.try_get_mut::<CallContext>(keys::CALL_CONTEXT)
}
