//! Per-instance circuit breaker fed by completed calls

use crate::CIRCUIT_STATE_ATTR;
use dashmap::DashMap;
use outrig_core::{CallContext, Error, Stage};
use outrig_plugins::{EnhancedPlugin, PluginError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Calls pass through normally
    Closed,
    /// The instance is considered unhealthy
    Open,
    /// A limited number of trial calls decide between closed and open
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker settings, read from the plugin's `config` mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitBreakerSettings {
    /// Failure rate in (0, 1] at which the circuit opens
    pub failure_threshold: f64,

    /// Calls observed before the failure rate is considered
    pub min_requests: u64,

    /// Time spent open before probing again
    #[serde(with = "humantime_serde")]
    pub open_timeout: Duration,

    /// Trial calls observed while half-open
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 0.5,
            min_requests: 10,
            open_timeout: Duration::from_secs(30),
            half_open_max_requests: 5,
        }
    }
}

impl CircuitBreakerSettings {
    /// Parse settings from a plugin `config` value; `null` means defaults
    pub fn from_value(value: &serde_json::Value) -> outrig_core::Result<Self> {
        let settings = if value.is_null() {
            Self::default()
        } else {
            Self::deserialize(value)
                .map_err(|e| Error::config(format!("{}: {}", CircuitBreakerReporter::NAME, e)))?
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges
    pub fn validate(&self) -> outrig_core::Result<()> {
        if !(self.failure_threshold > 0.0 && self.failure_threshold <= 1.0) {
            return Err(Error::config(format!(
                "{}: failure_threshold must be in (0, 1], got {}",
                CircuitBreakerReporter::NAME,
                self.failure_threshold
            )));
        }

        if self.half_open_max_requests == 0 {
            return Err(Error::config(format!(
                "{}: half_open_max_requests must be at least 1",
                CircuitBreakerReporter::NAME
            )));
        }

        Ok(())
    }
}

/// Counters for one breaker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerMetrics {
    /// Current state
    pub state: CircuitState,
    /// Successful calls since the last transition
    pub success_count: u64,
    /// Failed calls since the last transition
    pub failure_count: u64,
    /// All calls since the last transition
    pub total_count: u64,
    /// Failure rate (0.0 to 1.0)
    pub failure_rate: f64,
}

#[derive(Debug)]
struct Window {
    state: CircuitState,
    successes: u64,
    failures: u64,
    trials_admitted: u32,
    changed_at: Instant,
}

impl Window {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            successes: 0,
            failures: 0,
            trials_admitted: 0,
            changed_at: Instant::now(),
        }
    }

    fn total(&self) -> u64 {
        self.successes + self.failures
    }

    fn failure_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.failures as f64 / total as f64,
        }
    }

    fn transition(&mut self, key: &str, to: CircuitState) {
        if self.state == to {
            return;
        }

        let from = self.state;
        *self = Self::new();
        self.state = to;

        match to {
            CircuitState::Open => warn!(instance = %key, from = %from, "Circuit opened"),
            _ => info!(instance = %key, from = %from, to = %to, "Circuit state changed"),
        }
    }

    fn metrics(&self) -> BreakerMetrics {
        BreakerMetrics {
            state: self.state,
            success_count: self.successes,
            failure_count: self.failures,
            total_count: self.total(),
            failure_rate: self.failure_rate(),
        }
    }
}

/// Breaker for a single instance
#[derive(Debug)]
struct Breaker {
    window: Mutex<Window>,
}

impl Breaker {
    fn new() -> Self {
        Self {
            window: Mutex::new(Window::new()),
        }
    }

    fn state(&self) -> CircuitState {
        self.window.lock().state
    }

    fn record(&self, key: &str, failed: bool, settings: &CircuitBreakerSettings) -> CircuitState {
        let mut window = self.window.lock();

        if window.state == CircuitState::Open
            && window.changed_at.elapsed() >= settings.open_timeout
        {
            window.transition(key, CircuitState::HalfOpen);
        }

        if failed {
            window.failures += 1;
        } else {
            window.successes += 1;
        }

        match window.state {
            CircuitState::Closed => {
                if window.total() >= settings.min_requests
                    && window.failure_rate() >= settings.failure_threshold
                {
                    window.transition(key, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                if window.total() >= u64::from(settings.half_open_max_requests) {
                    let next = if window.failure_rate() >= settings.failure_threshold {
                        CircuitState::Open
                    } else {
                        CircuitState::Closed
                    };
                    window.transition(key, next);
                }
            }
            CircuitState::Open => {}
        }

        window.state
    }

    fn allow_request(&self, key: &str, settings: &CircuitBreakerSettings) -> bool {
        let mut window = self.window.lock();

        match window.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if window.changed_at.elapsed() >= settings.open_timeout {
                    window.transition(key, CircuitState::HalfOpen);
                    window.trials_admitted = 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if window.trials_admitted < settings.half_open_max_requests {
                    window.trials_admitted += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn reset(&self) {
        *self.window.lock() = Window::new();
    }
}

/// Post-stage plugin classifying each call per `host:port` instance
///
/// A call fails when the response is a 5xx or a transport failure was
/// recorded. Clones share the same breakers.
#[derive(Debug, Clone)]
pub struct CircuitBreakerReporter {
    settings: CircuitBreakerSettings,
    breakers: Arc<DashMap<String, Arc<Breaker>>>,
}

impl CircuitBreakerReporter {
    /// Registry name
    pub const NAME: &'static str = "circuit-breaker";

    /// Create a reporter with the given settings
    pub fn new(settings: CircuitBreakerSettings) -> Self {
        Self {
            settings,
            breakers: Arc::new(DashMap::new()),
        }
    }

    /// Settings in use
    pub fn settings(&self) -> &CircuitBreakerSettings {
        &self.settings
    }

    fn breaker(&self, key: &str) -> Arc<Breaker> {
        self.breakers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Breaker::new()))
            .clone()
    }

    /// State of an instance's breaker; unknown instances are closed
    pub fn state(&self, key: &str) -> CircuitState {
        self.breakers
            .get(key)
            .map(|b| b.state())
            .unwrap_or(CircuitState::Closed)
    }

    /// Check whether a call to `key` should be attempted
    pub fn allow_request(&self, key: &str) -> bool {
        self.breaker(key).allow_request(key, &self.settings)
    }

    /// Record a call outcome directly
    pub fn record(&self, key: &str, failed: bool) -> CircuitState {
        self.breaker(key).record(key, failed, &self.settings)
    }

    /// Counters for one instance
    pub fn metrics(&self, key: &str) -> Option<BreakerMetrics> {
        self.breakers.get(key).map(|b| b.window.lock().metrics())
    }

    /// Counters for every known instance, sorted by key
    pub fn all_metrics(&self) -> Vec<(String, BreakerMetrics)> {
        let mut all: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().window.lock().metrics()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Close an instance's breaker and clear its counters
    pub fn reset(&self, key: &str) {
        if let Some(breaker) = self.breakers.get(key) {
            breaker.reset();
            info!(instance = %key, "Circuit breaker reset");
        }
    }
}

impl Default for CircuitBreakerReporter {
    fn default() -> Self {
        Self::new(CircuitBreakerSettings::default())
    }
}

impl EnhancedPlugin for CircuitBreakerReporter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn stage(&self) -> Stage {
        Stage::Post
    }

    fn run(&self, ctx: &mut CallContext) -> Result<(), PluginError> {
        let key = ctx
            .target_service()
            .map(|instance| instance.authority())
            .ok_or_else(|| PluginError::missing("target service"))?;
        let status = ctx
            .response_status()
            .ok_or_else(|| PluginError::missing("response"))?;

        let failed = status >= 500 || ctx.failure().is_some();
        let state = self.record(&key, failed);

        debug!(instance = %key, status, failed, state = %state, "Recorded call outcome");
        ctx.set_attribute(CIRCUIT_STATE_ATTR, serde_json::json!(state.to_string()));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outrig_core::{CallFailure, FailureKind, Headers, ResponseSnapshot, ServiceInstance};
    use std::thread::sleep;

    const KEY: &str = "10.0.0.1:8080";

    fn settings(min_requests: u64, open_timeout: Duration) -> CircuitBreakerSettings {
        CircuitBreakerSettings {
            failure_threshold: 0.5,
            min_requests,
            open_timeout,
            half_open_max_requests: 3,
        }
    }

    fn context(status: u16) -> CallContext {
        let mut ctx = CallContext::new();
        ctx.set_target_service(ServiceInstance::new("svc-a", "10.0.0.1", 8080));
        ctx.set_response(ResponseSnapshot::new(status, Headers::new()));
        ctx
    }

    #[test]
    fn test_closed_to_open() {
        let reporter = CircuitBreakerReporter::new(settings(5, Duration::from_secs(1)));

        assert_eq!(reporter.state(KEY), CircuitState::Closed);
        assert!(reporter.allow_request(KEY));

        reporter.record(KEY, false);
        reporter.record(KEY, false);
        reporter.record(KEY, true);
        reporter.record(KEY, true);
        assert_eq!(reporter.state(KEY), CircuitState::Closed);
        reporter.record(KEY, true);

        assert_eq!(reporter.state(KEY), CircuitState::Open);
        assert!(!reporter.allow_request(KEY));
    }

    #[test]
    fn test_open_to_half_open_to_closed() {
        let reporter = CircuitBreakerReporter::new(settings(3, Duration::from_millis(50)));

        for _ in 0..3 {
            reporter.record(KEY, true);
        }
        assert_eq!(reporter.state(KEY), CircuitState::Open);

        sleep(Duration::from_millis(80));
        assert!(reporter.allow_request(KEY));
        assert_eq!(reporter.state(KEY), CircuitState::HalfOpen);

        for _ in 0..3 {
            reporter.record(KEY, false);
        }
        assert_eq!(reporter.state(KEY), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failures_reopen() {
        let reporter = CircuitBreakerReporter::new(settings(3, Duration::from_millis(50)));

        for _ in 0..3 {
            reporter.record(KEY, true);
        }
        sleep(Duration::from_millis(80));

        // The first observation after the timeout starts probing
        assert_eq!(reporter.record(KEY, true), CircuitState::HalfOpen);
        reporter.record(KEY, false);
        assert_eq!(reporter.record(KEY, true), CircuitState::Open);
    }

    #[test]
    fn test_half_open_limits_trial_calls() {
        let reporter = CircuitBreakerReporter::new(settings(1, Duration::from_millis(20)));

        reporter.record(KEY, true);
        sleep(Duration::from_millis(40));

        let admitted = (0..5).filter(|_| reporter.allow_request(KEY)).count();
        assert_eq!(admitted, 3);
    }

    #[test]
    fn test_plugin_classifies_status() {
        let reporter = CircuitBreakerReporter::new(settings(100, Duration::from_secs(1)));

        let mut ok = context(200);
        reporter.run(&mut ok).unwrap();
        reporter.run(&mut context(503)).unwrap();

        let metrics = reporter.metrics(KEY).unwrap();
        assert_eq!(metrics.success_count, 1);
        assert_eq!(metrics.failure_count, 1);
        assert_eq!(metrics.failure_rate, 0.5);
        assert_eq!(
            ok.attribute(CIRCUIT_STATE_ATTR),
            Some(&serde_json::json!("closed"))
        );
    }

    #[test]
    fn test_recorded_failure_counts_as_failure() {
        let reporter = CircuitBreakerReporter::default();
        let mut ctx = context(200);
        ctx.set_failure(CallFailure::new(FailureKind::Timeout, "read timed out"));

        reporter.run(&mut ctx).unwrap();

        assert_eq!(reporter.metrics(KEY).unwrap().failure_count, 1);
    }

    #[test]
    fn test_missing_facts() {
        let reporter = CircuitBreakerReporter::default();

        let err = reporter.run(&mut CallContext::new()).unwrap_err();
        assert!(matches!(err, PluginError::MissingFact(_)));

        let mut ctx = CallContext::new();
        ctx.set_target_service(ServiceInstance::new("svc-a", "10.0.0.1", 8080));
        let err = reporter.run(&mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "Missing fact: response");

        assert!(reporter.all_metrics().is_empty());
    }

    #[test]
    fn test_clones_share_breakers() {
        let reporter = CircuitBreakerReporter::default();
        let clone = reporter.clone();

        clone.record("a:1", true);
        reporter.record("b:2", false);

        let keys: Vec<String> = reporter.all_metrics().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a:1", "b:2"]);
    }

    #[test]
    fn test_reset() {
        let reporter = CircuitBreakerReporter::new(settings(1, Duration::from_secs(60)));
        reporter.record(KEY, true);
        assert_eq!(reporter.state(KEY), CircuitState::Open);

        reporter.reset(KEY);

        assert_eq!(reporter.state(KEY), CircuitState::Closed);
        assert_eq!(reporter.metrics(KEY).unwrap().total_count, 0);
    }

    #[test]
    fn test_settings_from_value() {
        let settings = CircuitBreakerSettings::from_value(&serde_json::json!({
            "failure_threshold": 0.25,
            "open_timeout": "250ms"
        }))
        .unwrap();
        assert_eq!(settings.failure_threshold, 0.25);
        assert_eq!(settings.open_timeout, Duration::from_millis(250));
        assert_eq!(settings.min_requests, 10);

        let defaults = CircuitBreakerSettings::from_value(&serde_json::Value::Null).unwrap();
        assert_eq!(defaults, CircuitBreakerSettings::default());
    }

    #[test]
    fn test_settings_rejected() {
        for value in [
            serde_json::json!({"failure_threshold": 0.0}),
            serde_json::json!({"failure_threshold": 1.5}),
            serde_json::json!({"half_open_max_requests": 0}),
            serde_json::json!({"open_timeout": "soon"}),
            serde_json::json!({"threshold": 0.5}),
        ] {
            assert!(
                CircuitBreakerSettings::from_value(&value).is_err(),
                "{value}"
            );
        }
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half-open");
        assert_eq!(
            serde_json::to_string(&CircuitState::HalfOpen).unwrap(),
            r#""half-open""#
        );
    }
}
