//! Prometheus metrics for the sentinel execution gate.
//!
//! Covers:
//! - Session risk (kill-switch trips, daily P&L)
//! - Margin and Reg-T buffer
//! - Degraded-mode events (macro calendar, book timeouts, risk snapshots)
//! - Per-decision outcome counts and order flow
//! - Microstructure scores and portfolio risk
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means a duplicate metric name, which must crash at startup. These panics only
//! occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Encoder, Gauge, GaugeVec, TextEncoder,
};

use crate::error::TelemetryResult;

// ============================================================================
// Session Risk
// ============================================================================

/// Kill-switch trips (daily loss limit breached).
pub static KILL_SWITCH_TRIPS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "sentinel_kill_switch_trips_total",
        "Session kill-switch trips"
    )
    .unwrap()
});

/// Daily P&L as a fraction of session-start NAV.
pub static DAILY_PNL_PCT: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "sentinel_daily_pnl_pct",
        "Daily P&L relative to session-start NAV"
    )
    .unwrap()
});

/// Sizing refused because margin usage exceeded the buffer.
pub static MARGIN_BREACHES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "sentinel_margin_breaches_total",
        "Sizing refusals due to the margin buffer"
    )
    .unwrap()
});

// ============================================================================
// Degraded Mode
// ============================================================================

/// Macro calendar fetch failures (fail-open).
/// Labels: kind (transient/fatal)
pub static MACRO_FETCH_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sentinel_macro_fetch_failures_total",
        "Macro calendar fetch failures treated as clear",
        &["kind"]
    )
    .unwrap()
});

/// Degraded-mode events.
/// Labels: kind (book_timeout/book_unavailable/account_unavailable/risk_degraded/...)
pub static DEGRADED_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sentinel_degraded_events_total",
        "Degraded-mode events by kind",
        &["kind"]
    )
    .unwrap()
});

// ============================================================================
// Decisions and Orders
// ============================================================================

/// Decision outcomes.
/// Labels: status (SKIPPED/FLATTENED/EXECUTED), reason
pub static DECISIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sentinel_decisions_total",
        "Decision cycle outcomes",
        &["status", "reason"]
    )
    .unwrap()
});

/// Orders sent to the venue.
/// Labels: kind (entry/hedge/flatten)
pub static ORDERS_SENT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sentinel_orders_sent_total",
        "Orders submitted to the execution venue",
        &["kind"]
    )
    .unwrap()
});

/// Flatten-all invocations.
/// Labels: reason
pub static FLATTEN_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sentinel_flatten_total",
        "Flatten-all invocations",
        &["reason"]
    )
    .unwrap()
});

/// Audit records dropped by the bounded queue or failed writes.
pub static AUDIT_DROPPED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "sentinel_audit_dropped_total",
        "Audit records dropped"
    )
    .unwrap()
});

// ============================================================================
// Microstructure
// ============================================================================

pub static FILL_PROBABILITY: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "sentinel_fill_probability",
        "Predicted passive fill probability at routing time",
        &["symbol"]
    )
    .unwrap()
});

pub static SLIPPAGE_BPS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "sentinel_slippage_bps",
        "Estimated slippage of the last candidate order in bps",
        &["symbol"]
    )
    .unwrap()
});

pub static ADVERSE_COST_BPS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "sentinel_adverse_cost_bps",
        "Adverse-selection cost of the last candidate order in bps",
        &["symbol"]
    )
    .unwrap()
});

// ============================================================================
// Portfolio Risk
// ============================================================================

pub static PORTFOLIO_VAR_USD: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "sentinel_portfolio_var_usd",
        "One-day parametric VAR in USD"
    )
    .unwrap()
});

pub static NET_EXPOSURE_USD: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "sentinel_net_exposure_usd",
        "Net dollar exposure across open positions"
    )
    .unwrap()
});

pub static SECTOR_DELTA_USD: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "sentinel_sector_delta_usd",
        "Dollar delta per sector",
        &["sector"]
    )
    .unwrap()
});

pub static SMA_RATIO: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("sentinel_sma_ratio", "Reg-T SMA to equity ratio").unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a kill-switch trip.
    pub fn kill_switch_tripped() {
        KILL_SWITCH_TRIPS_TOTAL.inc();
    }

    pub fn daily_pnl_pct(pct: f64) {
        DAILY_PNL_PCT.set(pct);
    }

    /// Record a margin-buffer sizing refusal.
    pub fn margin_breach() {
        MARGIN_BREACHES_TOTAL.inc();
    }

    /// Record a failed macro calendar fetch.
    pub fn macro_fetch_failed(kind: &str) {
        MACRO_FETCH_FAILURES_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record a degraded-mode event.
    pub fn degraded_event(kind: &str) {
        DEGRADED_EVENTS_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record a decision outcome.
    pub fn decision(status: &str, reason: &str) {
        DECISIONS_TOTAL.with_label_values(&[status, reason]).inc();
    }

    pub fn order_sent(kind: &str) {
        ORDERS_SENT_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn flatten(reason: &str) {
        FLATTEN_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn audit_dropped() {
        AUDIT_DROPPED_TOTAL.inc();
    }

    pub fn fill_probability(symbol: &str, p: f64) {
        FILL_PROBABILITY.with_label_values(&[symbol]).set(p);
    }

    pub fn slippage_bps(symbol: &str, bps: f64) {
        SLIPPAGE_BPS.with_label_values(&[symbol]).set(bps);
    }

    pub fn adverse_cost_bps(symbol: &str, bps: f64) {
        ADVERSE_COST_BPS.with_label_values(&[symbol]).set(bps);
    }

    /// Publish a portfolio risk snapshot.
    pub fn portfolio_risk(var_usd: f64, net_exposure_usd: f64, sector_deltas: &[(&str, f64)]) {
        PORTFOLIO_VAR_USD.set(var_usd);
        NET_EXPOSURE_USD.set(net_exposure_usd);
        for (sector, delta) in sector_deltas {
            SECTOR_DELTA_USD.with_label_values(&[*sector]).set(*delta);
        }
    }

    pub fn sma_ratio(ratio: f64) {
        SMA_RATIO.set(ratio);
    }
}

/// Render every registered metric in the Prometheus text format.
pub fn encode_text() -> TelemetryResult<String> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = MARGIN_BREACHES_TOTAL.get();
        Metrics::margin_breach();
        assert_eq!(MARGIN_BREACHES_TOTAL.get(), before + 1.0);

        let before = DEGRADED_EVENTS_TOTAL
            .with_label_values(&["book_timeout"])
            .get();
        Metrics::degraded_event("book_timeout");
        assert_eq!(
            DEGRADED_EVENTS_TOTAL
                .with_label_values(&["book_timeout"])
                .get(),
            before + 1.0
        );
    }

    #[test]
    fn test_encode_text_contains_metric_names() {
        Metrics::sma_ratio(0.25);
        Metrics::decision("SKIPPED", "book_timeout");
        let text = encode_text().unwrap();
        assert!(text.contains("sentinel_sma_ratio"));
        assert!(text.contains("sentinel_decisions_total"));
    }
}
