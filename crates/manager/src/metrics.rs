//! Deadlock manager metrics using the native Prometheus client.
//!
//! Metrics live in the process-global default registry. Use
//! [`gather_text`] to render them in the text exposition format.

use banker_types::{EngineState, RecoveryOutcome, RequestOutcome, SafetyVerdict};
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Domain-specific metrics for the deadlock manager.
pub struct Metrics {
    // === Allocator ===
    pub requests: CounterVec,
    pub units_released: Counter,
    pub releases_clamped: Counter,

    // === Safety ===
    pub safety_checks: CounterVec,
    pub safety_check_latency: Histogram,

    // === Recovery ===
    pub recoveries: CounterVec,

    // === Lifecycle ===
    pub engine_state: Gauge,
}

impl Metrics {
    fn new() -> Self {
        // Safety checks are O(P^2 * R) on tiny matrices: 1us to 10ms
        let latency_buckets = vec![
            0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01,
        ];

        Self {
            requests: register_counter_vec!(
                "banker_requests_total",
                "Resource requests by outcome",
                &["outcome"]
            )
            .unwrap(),

            units_released: register_counter!(
                "banker_units_released_total",
                "Resource units returned by release"
            )
            .unwrap(),

            releases_clamped: register_counter!(
                "banker_releases_clamped_total",
                "Releases that asked for more units than were held"
            )
            .unwrap(),

            safety_checks: register_counter_vec!(
                "banker_safety_checks_total",
                "Banker's algorithm runs by verdict",
                &["verdict"]
            )
            .unwrap(),

            safety_check_latency: register_histogram!(
                "banker_safety_check_latency_seconds",
                "Time spent inside the safety check, lock held",
                latency_buckets
            )
            .unwrap(),

            recoveries: register_counter_vec!(
                "banker_recoveries_total",
                "Recovery passes by outcome",
                &["outcome"]
            )
            .unwrap(),

            engine_state: register_gauge!(
                "banker_engine_state",
                "Lifecycle state (0 idle, 1 running, 2 shutting down, 3 stopped)"
            )
            .unwrap(),
        }
    }
}

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

/// Record a request outcome.
pub fn record_request(outcome: RequestOutcome) {
    metrics()
        .requests
        .with_label_values(&[outcome.as_str()])
        .inc();
}

/// Record a request rejected by the ledger.
///
/// **Cardinality control**: only `"claim_exceeded"` and `"invalid"` are used.
pub fn record_request_rejected(reason: &str) {
    debug_assert!(
        matches!(reason, "claim_exceeded" | "invalid"),
        "Unknown rejection reason: {}",
        reason
    );
    metrics().requests.with_label_values(&[reason]).inc();
}

/// Record a release.
pub fn record_release(released: u32, clamped: bool) {
    let m = metrics();
    m.units_released.inc_by(f64::from(released));
    if clamped {
        m.releases_clamped.inc();
    }
}

/// Record a completed safety check.
pub fn record_safety_check(verdict: &SafetyVerdict, latency_secs: f64) {
    let m = metrics();
    m.safety_checks
        .with_label_values(&[verdict.as_str()])
        .inc();
    m.safety_check_latency.observe(latency_secs);
}

/// Record a safety check refused because another was in flight.
pub fn record_safety_check_skipped() {
    metrics()
        .safety_checks
        .with_label_values(&["already_running"])
        .inc();
}

/// Record a recovery pass.
pub fn record_recovery(outcome: &RecoveryOutcome) {
    metrics()
        .recoveries
        .with_label_values(&[outcome.as_str()])
        .inc();
}

/// Update the lifecycle gauge.
pub fn set_engine_state(state: EngineState) {
    metrics().engine_state.set(state.as_gauge());
}

/// Render all registered metrics in the Prometheus text format.
pub fn gather_text() -> String {
    // make sure our metrics exist even if nothing was recorded yet
    let _ = metrics();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_text_contains_recorded_metrics() {
        record_request(RequestOutcome::Granted);
        record_safety_check(&SafetyVerdict::Safe(vec![]), 0.000_002);
        set_engine_state(EngineState::Running);

        let text = gather_text();
        assert!(text.contains("banker_requests_total"));
        assert!(text.contains("outcome=\"granted\""));
        assert!(text.contains("banker_safety_checks_total"));
        assert!(text.contains("banker_engine_state"));
    }
}
