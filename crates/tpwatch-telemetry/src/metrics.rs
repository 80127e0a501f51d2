//! Prometheus metrics for tpwatch.
//!
//! # Panics
//!
//! Registration panics on first use if a metric name is registered twice.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_int_gauge, CounterVec, IntGauge};

/// Update passes run.
/// Labels: trigger (poller/on_demand)
pub static UPDATE_PASSES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tpwatch_update_passes_total",
        "Total monitoring update passes",
        &["trigger"]
    )
    .unwrap()
});

/// Committed position transitions.
/// Labels: kind (tp_hit/stop_loss/final_take_profit/manual/other)
pub static TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tpwatch_transitions_total",
        "Total committed position transitions",
        &["kind"]
    )
    .unwrap()
});

/// Price lookups by outcome.
/// Labels: outcome (ok/unavailable/timeout)
pub static PRICE_LOOKUPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tpwatch_price_lookups_total",
        "Total price lookups by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Event sink delivery failures.
/// Labels: sink
pub static SINK_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tpwatch_sink_failures_total",
        "Total event sink delivery failures",
        &["sink"]
    )
    .unwrap()
});

/// Currently open positions.
pub static OPEN_POSITIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("tpwatch_open_positions", "Currently open positions").unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record an update pass.
    pub fn update_pass(trigger: &str) {
        UPDATE_PASSES_TOTAL.with_label_values(&[trigger]).inc();
    }

    /// Record a committed transition.
    pub fn transition(kind: &str) {
        TRANSITIONS_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record a price lookup outcome.
    pub fn price_lookup(outcome: &str) {
        PRICE_LOOKUPS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record a sink delivery failure.
    pub fn sink_failure(sink: &str) {
        SINK_FAILURES_TOTAL.with_label_values(&[sink]).inc();
    }

    /// Set the open position gauge.
    pub fn open_positions(count: usize) {
        OPEN_POSITIONS.set(count as i64);
    }
}
