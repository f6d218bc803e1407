//! End-to-end tests for the enhancement pipeline

use chrono::{DateTime, TimeDelta, Utc};
use http::{HeaderMap, HeaderValue, StatusCode};
use outrig::config::{load_config, ConfigBuilder, ReloadableConfig, REPORTER_KEY};
use outrig::gateway::{keys, AdapterOutcome, CallState, ManualClock, StageAdapter, UpstreamResponse};
use outrig::model::{
    CallContext, CallFailure, FailureKind, ResponseSnapshot, ServiceInstance, Stage,
};
use outrig::plugins::testing::{CallLog, RecordingPlugin};
use outrig::plugins::{PluginRegistry, PluginRunner};
use outrig::reporters::{build_reporters, CircuitState, CIRCUIT_STATE_ATTR, TRACE_STATUS_CLASS_ATTR};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use url::Url;

fn start_time() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
}

fn recording_runner(log: &CallLog) -> PluginRunner {
    let mut builder = PluginRegistry::builder();
    for (name, stage, order) in [
        ("audit", Stage::Finally, 5),
        ("breaker", Stage::Post, 0),
        ("tagger", Stage::Post, -10),
        ("cleanup", Stage::Finally, 1),
    ] {
        builder
            .register(RecordingPlugin::new(name, stage, order, log).shared())
            .unwrap();
    }
    PluginRunner::new(Arc::new(builder.build()))
}

/// Simulates the routing filter for one call
fn complete_call(state: &mut CallState, clock: &ManualClock, status: u16, elapsed_ms: i64) {
    clock.advance(TimeDelta::milliseconds(elapsed_ms));
    state.insert(keys::SERVICE_ID, "svc-a".to_string());
    state.insert(
        keys::UPSTREAM_RESPONSE,
        UpstreamResponse::new(status, Url::parse("http://10.0.0.1:8080/orders").unwrap())
            .header("X", "1")
            .header("X", "2"),
    );
}

#[test]
fn test_end_to_end_scenario() {
    let log = CallLog::new();
    let clock = Arc::new(ManualClock::new(start_time()));
    let adapter = StageAdapter::new(
        recording_runner(&log),
        Arc::new(HashMap::<String, String>::new()),
    )
    .with_clock(clock.clone());

    let mut state = CallState::new();
    assert!(adapter.pre_dispatch(&mut state).is_none());
    complete_call(&mut state, &clock, 503, 100);

    let outcome = adapter.post_dispatch(&mut state);
    let (post, finally) = match outcome {
        AdapterOutcome::Executed { post, finally } => (post, finally),
        other => panic!("expected stages to run, got {other:?}"),
    };
    assert_eq!((post.executed, finally.executed), (2, 2));

    let mut expected = CallContext::new();
    expected.set_request_started_at(start_time());
    expected.set_response(ResponseSnapshot::from_pairs(503, [("X", "1"), ("X", "2")]));
    expected.set_elapsed_delay(TimeDelta::milliseconds(100));
    expected.set_target_service(ServiceInstance::new("svc-a", "10.0.0.1", 8080));

    assert_eq!(
        state.try_get::<CallContext>(keys::CALL_CONTEXT),
        Some(&expected)
    );

    let invocations = log.invocations();
    let order: Vec<(&str, Stage)> = invocations
        .iter()
        .map(|i| (i.plugin.as_str(), i.stage))
        .collect();
    assert_eq!(
        order,
        vec![
            ("tagger", Stage::Post),
            ("breaker", Stage::Post),
            ("cleanup", Stage::Finally),
            ("audit", Stage::Finally),
        ]
    );
    assert!(invocations.iter().all(|i| i.context == expected));
}

#[test]
fn test_missing_artifacts_leave_state_untouched() {
    let log = CallLog::new();
    let clock = Arc::new(ManualClock::new(start_time()));
    let adapter = StageAdapter::new(
        recording_runner(&log),
        Arc::new(HashMap::<String, String>::new()),
    )
    .with_clock(clock.clone());

    let mut state = CallState::new();
    state.insert(keys::PRE_ROUTE_TIME, start_time());

    let outcome = adapter.post_dispatch(&mut state);

    assert!(matches!(outcome, AdapterOutcome::Skipped(_)));
    assert!(log.is_empty());
    assert_eq!(state.len(), 1);
}

#[test]
fn test_reporter_flag_reloads_per_call() {
    let log = CallLog::new();
    let clock = Arc::new(ManualClock::new(start_time()));
    let config = Arc::new(ReloadableConfig::new(ConfigBuilder::new().build().unwrap()));
    let adapter =
        StageAdapter::new(recording_runner(&log), config.clone()).with_clock(clock.clone());

    let mut first = CallState::new();
    adapter.pre_dispatch(&mut first);
    complete_call(&mut first, &clock, 200, 5);
    assert!(adapter.post_dispatch(&mut first).is_executed());

    config.store(ConfigBuilder::new().reporter("false").build().unwrap());

    let mut second = CallState::new();
    adapter.pre_dispatch(&mut second);
    complete_call(&mut second, &clock, 200, 5);
    assert_eq!(adapter.post_dispatch(&mut second), AdapterOutcome::Disabled);

    assert_eq!(log.len(), 4);
}

#[test]
fn test_reference_reporters_from_config_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        r#"
rpc_enhancement:
  reporter: "true"
  plugins:
    - name: circuit-breaker
      config:
        failure_threshold: 0.5
        min_requests: 4
        open_timeout: 30s
    - name: tracing
    - name: metrics
"#
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    let reporters = build_reporters(&config).unwrap();
    let breaker = reporters.circuit_breaker.clone().unwrap();
    let metrics = reporters.metrics.clone().unwrap();

    let clock = Arc::new(ManualClock::new(start_time()));
    let runner = PluginRunner::new(Arc::new(reporters.registry));
    let adapter = StageAdapter::new(runner, Arc::new(config)).with_clock(clock.clone());

    let mut headers = HeaderMap::new();
    headers.append("x-request-id", HeaderValue::from_static("abc"));

    let url = Url::parse("http://10.0.0.1:8080/").unwrap();
    let mut last = None;
    for (status, failure) in [
        (StatusCode::OK, None),
        (StatusCode::SERVICE_UNAVAILABLE, None),
        (StatusCode::OK, Some(FailureKind::Timeout)),
        (StatusCode::BAD_GATEWAY, None),
    ] {
        let mut state = CallState::new();
        adapter.pre_dispatch(&mut state);
        clock.advance(TimeDelta::milliseconds(20));
        state.insert(
            keys::UPSTREAM_RESPONSE,
            UpstreamResponse::from_http(status, &headers, url.clone()).service_id("svc-a"),
        );
        if let Some(kind) = failure {
            state.insert(
                keys::CALL_FAILURE,
                CallFailure::new(kind, "upstream gave up"),
            );
        }

        let outcome = adapter.post_dispatch(&mut state);
        let (post, finally) = match outcome {
            AdapterOutcome::Executed { post, finally } => (post, finally),
            other => panic!("expected stages to run, got {other:?}"),
        };
        assert!(post.is_clean() && finally.is_clean());

        last = state.take::<CallContext>(keys::CALL_CONTEXT);
    }

    assert_eq!(breaker.state("10.0.0.1:8080"), CircuitState::Open);

    let ctx = last.unwrap();
    assert_eq!(
        ctx.attribute(CIRCUIT_STATE_ATTR),
        Some(&serde_json::json!("open"))
    );
    assert_eq!(
        ctx.attribute(TRACE_STATUS_CLASS_ATTR),
        Some(&serde_json::json!("5xx"))
    );

    let snapshot = metrics.snapshot();
    let svc = snapshot.service("svc-a").unwrap();
    assert_eq!(svc.request_count, 4);
    assert_eq!(svc.error_count, 3);
    assert_eq!(svc.timeout_count, 1);
    assert_eq!(svc.avg_latency_ms, 20.0);
}

#[test]
fn test_reporter_flag_key_in_properties() {
    let log = CallLog::new();
    let properties: HashMap<String, String> = [(REPORTER_KEY.to_string(), "off".to_string())]
        .into_iter()
        .collect();
    let adapter = StageAdapter::new(recording_runner(&log), Arc::new(properties));

    let mut state = CallState::new();
    adapter.pre_dispatch(&mut state);
    state.insert(
        keys::UPSTREAM_RESPONSE,
        UpstreamResponse::new(200, Url::parse("http://10.0.0.1:8080/").unwrap()),
    );

    assert_eq!(adapter.post_dispatch(&mut state), AdapterOutcome::Disabled);
    assert!(log.is_empty());
}
