//! Prometheus metrics for the SCADA monitor.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, which is a programming error that should
//! crash at first use rather than silently drop metrics.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_int_counter,
    register_int_gauge, CounterVec, Encoder, Gauge, GaugeVec, IntCounter, IntGauge, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Push channel open (1) or not (0).
pub static PUSH_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("scada_push_connected", "Push channel state (1=open)").unwrap()
});

/// Push channel state machine current state.
/// Labels: state (connecting/open/closed_pending_reconnect/stopped)
pub static PUSH_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "scada_push_state",
        "Push channel state machine current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Total push channel reconnect attempts.
pub static PUSH_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "scada_push_reconnect_total",
        "Total push channel reconnect attempts",
        &["reason"]
    )
    .unwrap()
});

/// Push frames dropped because they could not be parsed.
pub static PUSH_MALFORMED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "scada_push_malformed_total",
        "Push frames dropped because they failed to parse"
    )
    .unwrap()
});

/// Push messages received, by kind.
pub static PUSH_MESSAGES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "scada_push_messages_total",
        "Push messages received by kind",
        &["kind"]
    )
    .unwrap()
});

/// Request retries, by reason (network/server/rate_limited).
pub static REQUEST_RETRY_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "scada_request_retry_total",
        "Total request retries by reason",
        &["reason"]
    )
    .unwrap()
});

/// Requests that failed after exhausting retries, by error kind.
pub static REQUEST_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "scada_request_failed_total",
        "Requests that failed after retries",
        &["kind"]
    )
    .unwrap()
});

/// Poll ticks whose status fetch failed.
pub static POLL_FAILED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("scada_poll_failed_total", "Failed status polls").unwrap()
});

/// Updates applied to the dashboard store, by kind and source.
pub static STORE_UPDATES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "scada_store_updates_total",
        "Updates applied to the dashboard store",
        &["kind", "source"]
    )
    .unwrap()
});

/// Updates rejected by the merge policy (stale versions).
pub static STORE_REJECTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "scada_store_rejected_total",
        "Updates rejected as older than the stored version"
    )
    .unwrap()
});

/// Alerts emitted, by kind.
pub static ALERTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("scada_alerts_total", "User-facing alerts emitted", &["kind"]).unwrap()
});

/// Diagram frames drawn.
pub static FRAMES_DRAWN_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("scada_frames_drawn_total", "Diagram frames drawn").unwrap()
});

/// Lines in the most recently drawn frame.
pub static DIAGRAM_LINES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("scada_diagram_lines", "Process lines in the last frame").unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Set push channel state.
    /// Only the active state is set to 1, all others to 0.
    pub fn push_state_set(state: &str) {
        for s in &["connecting", "open", "closed_pending_reconnect", "stopped"] {
            PUSH_STATE.with_label_values(&[s]).set(0.0);
        }
        PUSH_STATE.with_label_values(&[state]).set(1.0);
        PUSH_CONNECTED.set(if state == "open" { 1.0 } else { 0.0 });
    }

    pub fn push_reconnect(reason: &str) {
        PUSH_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn push_malformed() {
        PUSH_MALFORMED_TOTAL.inc();
    }

    pub fn push_message(kind: &str) {
        PUSH_MESSAGES_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn request_retry(reason: &str) {
        REQUEST_RETRY_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn request_failed(kind: &str) {
        REQUEST_FAILED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn poll_failed() {
        POLL_FAILED_TOTAL.inc();
    }

    pub fn store_update(kind: &str, source: &str) {
        STORE_UPDATES_TOTAL.with_label_values(&[kind, source]).inc();
    }

    pub fn store_rejected() {
        STORE_REJECTED_TOTAL.inc();
    }

    pub fn alert(kind: &str) {
        ALERTS_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record one drawn frame and the number of lines it showed.
    pub fn frame_drawn(line_count: usize) {
        FRAMES_DRAWN_TOTAL.inc();
        DIAGRAM_LINES.set(line_count as i64);
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
