//! Prometheus metrics
//!
//! Recorded through the `metrics` facade; without an installed exporter every
//! call is a no-op.

use std::time::Duration;

/// Monotonic counters
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Signed orders accepted by the exchange
    OrdersSubmitted,
    /// Legs that reported a nonzero fill
    OrdersFilled,
    /// Orders cancelled after an unfilled attempt
    OrdersCancelled,
    /// Stream reconnect attempts
    WsReconnects,
    /// Round switchovers on the pre-subscribed path
    RoundSwitches,
    /// Switchovers that took the degraded fallback path
    RoundFallbacks,
}

impl CounterMetric {
    pub fn name(&self) -> &'static str {
        match self {
            CounterMetric::OrdersSubmitted => "orders_submitted_total",
            CounterMetric::OrdersFilled => "orders_filled_total",
            CounterMetric::OrdersCancelled => "orders_cancelled_total",
            CounterMetric::WsReconnects => "ws_reconnects_total",
            CounterMetric::RoundSwitches => "round_switches_total",
            CounterMetric::RoundFallbacks => "round_fallbacks_total",
        }
    }
}

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Sign + POST of one order
    OrderSubmission,
    /// One full hedge attempt for an account pair
    HedgeRun,
}

impl LatencyMetric {
    pub fn name(&self) -> &'static str {
        match self {
            LatencyMetric::OrderSubmission => "order_submit_latency_ms",
            LatencyMetric::HedgeRun => "hedge_run_latency_ms",
        }
    }
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Instruments with a live book
    TrackedBooks,
}

impl GaugeMetric {
    pub fn name(&self) -> &'static str {
        match self {
            GaugeMetric::TrackedBooks => "tracked_books",
        }
    }
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    metrics::counter!(metric.name()).increment(1);
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    metrics::histogram!(metric.name()).record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}
