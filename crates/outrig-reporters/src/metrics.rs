//! Per-service call metrics, collected in the finally stage

use crate::CIRCUIT_STATE_ATTR;
use dashmap::DashMap;
use outrig_core::{CallContext, Error, FailureKind, Stage};
use outrig_plugins::{EnhancedPlugin, PluginError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Service key used when the context names no instance
const UNKNOWN_SERVICE: &str = "unknown";

/// Metrics reporter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsSettings {
    /// Recent latencies kept per service for percentiles
    pub latency_window: usize,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            latency_window: 1000,
        }
    }
}

impl MetricsSettings {
    /// Parse settings from a plugin `config` value; `null` means defaults
    pub fn from_value(value: &serde_json::Value) -> outrig_core::Result<Self> {
        let settings = if value.is_null() {
            Self::default()
        } else {
            Self::deserialize(value)
                .map_err(|e| Error::config(format!("{}: {}", MetricsReporter::NAME, e)))?
        };

        if settings.latency_window == 0 {
            return Err(Error::config(format!(
                "{}: latency_window must be at least 1",
                MetricsReporter::NAME
            )));
        }

        Ok(settings)
    }
}

/// How a call ended, as far as metrics care
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Error,
    Timeout,
}

impl Outcome {
    fn classify(ctx: &CallContext) -> Self {
        match ctx.failure() {
            Some(failure) if failure.kind == FailureKind::Timeout => Outcome::Timeout,
            Some(_) => Outcome::Error,
            None if ctx.response_status().is_some_and(|s| s >= 500) => Outcome::Error,
            None => Outcome::Success,
        }
    }
}

#[derive(Debug)]
struct ServiceStats {
    requests: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
    total_latency_ns: AtomicU64,
    min_latency_ns: AtomicU64,
    max_latency_ns: AtomicU64,
    recent: Mutex<VecDeque<u64>>,
}

impl ServiceStats {
    fn new(window: usize) -> Self {
        Self {
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            total_latency_ns: AtomicU64::new(0),
            min_latency_ns: AtomicU64::new(u64::MAX),
            max_latency_ns: AtomicU64::new(0),
            recent: Mutex::new(VecDeque::with_capacity(window)),
        }
    }

    fn record(&self, latency_ns: u64, outcome: Outcome, window: usize) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Outcome::Success => {}
            Outcome::Error => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Timeout => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                self.timeouts.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.total_latency_ns
            .fetch_add(latency_ns, Ordering::Relaxed);
        self.min_latency_ns.fetch_min(latency_ns, Ordering::Relaxed);
        self.max_latency_ns.fetch_max(latency_ns, Ordering::Relaxed);

        let mut recent = self.recent.lock();
        while recent.len() >= window {
            recent.pop_front();
        }
        recent.push_back(latency_ns);
    }

    fn percentiles(&self, wanted: &[f64]) -> Vec<f64> {
        let mut sorted: Vec<u64> = self.recent.lock().iter().copied().collect();
        if sorted.is_empty() {
            return vec![0.0; wanted.len()];
        }
        sorted.sort_unstable();

        wanted
            .iter()
            .map(|p| {
                let index = ((p / 100.0) * sorted.len() as f64) as usize;
                ns_to_ms(sorted[index.min(sorted.len() - 1)])
            })
            .collect()
    }

    fn snapshot(&self, service: &str) -> ServiceMetrics {
        let requests = self.requests.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let total_ns = self.total_latency_ns.load(Ordering::Relaxed);
        let min_ns = self.min_latency_ns.load(Ordering::Relaxed);
        let p = self.percentiles(&[50.0, 95.0, 99.0]);

        ServiceMetrics {
            service: service.to_string(),
            request_count: requests,
            error_count: errors,
            timeout_count: self.timeouts.load(Ordering::Relaxed),
            avg_latency_ms: if requests == 0 {
                0.0
            } else {
                ns_to_ms(total_ns) / requests as f64
            },
            min_latency_ms: if min_ns == u64::MAX {
                0.0
            } else {
                ns_to_ms(min_ns)
            },
            max_latency_ms: ns_to_ms(self.max_latency_ns.load(Ordering::Relaxed)),
            p50_latency_ms: p[0],
            p95_latency_ms: p[1],
            p99_latency_ms: p[2],
            error_rate: if requests == 0 {
                0.0
            } else {
                errors as f64 / requests as f64 * 100.0
            },
        }
    }
}

fn ns_to_ms(ns: u64) -> f64 {
    ns as f64 / 1_000_000.0
}

/// Metrics of one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetrics {
    /// Service id, or `host:port` when the id is empty
    pub service: String,
    /// Calls observed
    pub request_count: u64,
    /// Failed calls, timeouts included
    pub error_count: u64,
    /// Calls that timed out
    pub timeout_count: u64,
    /// Average latency in milliseconds
    pub avg_latency_ms: f64,
    /// Minimum latency in milliseconds
    pub min_latency_ms: f64,
    /// Maximum latency in milliseconds
    pub max_latency_ms: f64,
    /// P50 latency in milliseconds
    pub p50_latency_ms: f64,
    /// P95 latency in milliseconds
    pub p95_latency_ms: f64,
    /// P99 latency in milliseconds
    pub p99_latency_ms: f64,
    /// Error rate as percentage
    pub error_rate: f64,
}

/// Point-in-time copy of every service's metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Calls observed across all services
    pub total_requests: u64,
    /// Failed calls across all services
    pub total_errors: u64,
    /// Per-service metrics, sorted by service
    pub services: Vec<ServiceMetrics>,
}

impl MetricsSnapshot {
    /// Metrics of one service
    pub fn service(&self, service: &str) -> Option<&ServiceMetrics> {
        self.services.iter().find(|m| m.service == service)
    }
}

/// Finally-stage plugin aggregating counters and latency per service
///
/// Latency is the context's elapsed delay; a negative delay counts as zero.
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct MetricsReporter {
    settings: MetricsSettings,
    services: Arc<DashMap<String, Arc<ServiceStats>>>,
    total_requests: Arc<AtomicU64>,
    total_errors: Arc<AtomicU64>,
}

impl MetricsReporter {
    /// Registry name
    pub const NAME: &'static str = "metrics";

    /// Create a reporter with the given settings
    pub fn new(settings: MetricsSettings) -> Self {
        Self {
            settings,
            services: Arc::new(DashMap::new()),
            total_requests: Arc::new(AtomicU64::new(0)),
            total_errors: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Calls observed
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Copy out the current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut services: Vec<ServiceMetrics> = self
            .services
            .iter()
            .map(|entry| entry.value().snapshot(entry.key()))
            .collect();
        services.sort_by(|a, b| a.service.cmp(&b.service));

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            services,
        }
    }

    fn service_key(ctx: &CallContext) -> String {
        match ctx.target_service() {
            Some(instance) if !instance.service_id.is_empty() => instance.service_id.clone(),
            Some(instance) => instance.authority(),
            None => UNKNOWN_SERVICE.to_string(),
        }
    }
}

impl Default for MetricsReporter {
    fn default() -> Self {
        Self::new(MetricsSettings::default())
    }
}

impl EnhancedPlugin for MetricsReporter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn stage(&self) -> Stage {
        Stage::Finally
    }

    fn order(&self) -> i32 {
        100
    }

    fn run(&self, ctx: &mut CallContext) -> Result<(), PluginError> {
        let delay = ctx
            .elapsed_delay()
            .ok_or_else(|| PluginError::missing("elapsed delay"))?;
        let latency = delay.to_std().unwrap_or(Duration::ZERO);
        let latency_ns = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        let outcome = Outcome::classify(ctx);
        let service = Self::service_key(ctx);

        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if outcome != Outcome::Success {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }

        let window = self.settings.latency_window;
        // Release the shard lock before recording
        let stats = self
            .services
            .entry(service.clone())
            .or_insert_with(|| Arc::new(ServiceStats::new(window)))
            .clone();
        stats.record(latency_ns, outcome, window);

        debug!(
            service = %service,
            latency_ms = ns_to_ms(latency_ns),
            outcome = ?outcome,
            circuit = ?ctx.attribute(CIRCUIT_STATE_ATTR),
            "Recorded call metrics"
        );

        Ok(())
    }
}
