//! Portfolio exposure, sector deltas and parametric VAR.
//!
//! VAR_c = |Φ⁻¹(1 − c)| × σ, with σ the sample standard deviation of the most
//! recent `var_lookback_days` daily net P&L observations in USD.
//!
//! A snapshot that cannot be computed is returned with `RiskStatus::Degraded`
//! and must be treated as a breach by the caller. It is never reported as an
//! all-zero snapshot, since zero would hide a real breach.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sentinel_core::{Position, Price, Symbol};
use sentinel_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;
use tracing::{debug, warn};

use crate::config::PortfolioConfig;

/// Sector for symbols missing from the sector map.
pub const OTHER_SECTOR: &str = "OTHER";

// ============================================================================
// Return history
// ============================================================================

/// Source of historical daily net P&L (USD), oldest first.
pub trait ReturnHistory: Send + Sync {
    /// Up to `lookback` most recent observations.
    fn recent(&self, lookback: usize) -> Vec<f64>;
}

/// Bounded in-memory history.
#[derive(Debug)]
pub struct InMemoryReturnHistory {
    capacity: usize,
    values: RwLock<VecDeque<f64>>,
}

impl InMemoryReturnHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            values: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    #[must_use]
    pub fn from_values(capacity: usize, values: impl IntoIterator<Item = f64>) -> Self {
        let history = Self::new(capacity);
        for v in values {
            history.record(v);
        }
        history
    }

    /// Append one daily observation, evicting the oldest beyond capacity.
    pub fn record(&self, pnl_usd: f64) {
        let mut values = self.values.write();
        if values.len() == self.capacity {
            values.pop_front();
        }
        values.push_back(pnl_usd);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl ReturnHistory for InMemoryReturnHistory {
    fn recent(&self, lookback: usize) -> Vec<f64> {
        let values = self.values.read();
        let skip = values.len().saturating_sub(lookback);
        values.iter().skip(skip).copied().collect()
    }
}

// ============================================================================
// Snapshot
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RiskStatus {
    Ok,
    /// Inputs were missing or invalid; treat as a breach.
    Degraded { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    /// Σ qty × last price.
    pub net_exposure: Decimal,
    pub sector_deltas: BTreeMap<String, Decimal>,
    /// One-day VAR in USD, never negative.
    pub var_95: f64,
    pub timestamp: DateTime<Utc>,
    pub status: RiskStatus,
}

impl RiskSnapshot {
    /// Snapshot for a flat portfolio.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            net_exposure: Decimal::ZERO,
            sector_deltas: BTreeMap::new(),
            var_95: 0.0,
            timestamp: Utc::now(),
            status: RiskStatus::Ok,
        }
    }

    /// Snapshot that could not be computed.
    #[must_use]
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            status: RiskStatus::Degraded {
                reason: reason.into(),
            },
            ..Self::zero()
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, RiskStatus::Degraded { .. })
    }

    /// VAR strictly above `max_var_usd`.
    #[must_use]
    pub fn var_exceeds(&self, max_var_usd: Decimal) -> bool {
        self.var_95 > max_var_usd.to_f64().unwrap_or(f64::MAX)
    }
}

// ============================================================================
// Monitor
// ============================================================================

pub struct PortfolioRiskMonitor {
    sectors: HashMap<String, String>,
    lookback: usize,
    confidence: f64,
    history: Arc<dyn ReturnHistory>,
}

impl PortfolioRiskMonitor {
    #[must_use]
    pub fn new(config: &PortfolioConfig, history: Arc<dyn ReturnHistory>) -> Self {
        Self {
            sectors: config.sectors.clone(),
            lookback: config.var_lookback_days,
            confidence: config.var_confidence,
            history,
        }
    }

    #[must_use]
    pub fn sector_of(&self, symbol: &Symbol) -> &str {
        self.sectors
            .get(symbol.as_str())
            .map(String::as_str)
            .unwrap_or(OTHER_SECTOR)
    }

    /// Aggregate open positions valued at `marks`.
    ///
    /// Flat portfolio → all-zero `Ok` snapshot. A missing or non-positive mark,
    /// fewer than two history samples, or a non-finite σ → `Degraded`.
    #[must_use]
    pub fn snapshot(&self, positions: &[Position], marks: &HashMap<Symbol, Price>) -> RiskSnapshot {
        let open: Vec<&Position> = positions.iter().filter(|p| !p.is_flat()).collect();
        if open.is_empty() {
            let snapshot = RiskSnapshot::zero();
            self.publish(&snapshot);
            return snapshot;
        }

        let mut net_exposure = Decimal::ZERO;
        let mut sector_deltas: BTreeMap<String, Decimal> = BTreeMap::new();
        for position in &open {
            let Some(mark) = marks.get(&position.symbol).filter(|m| m.is_positive()) else {
                return self.degrade(format!("missing last price for {}", position.symbol));
            };
            let dollars = position.qty.notional(*mark);
            net_exposure += dollars;
            *sector_deltas
                .entry(self.sector_of(&position.symbol).to_string())
                .or_insert(Decimal::ZERO) += dollars;
        }

        let series = self.history.recent(self.lookback);
        if series.len() < 2 {
            return self.degrade(format!(
                "insufficient P&L history ({} samples)",
                series.len()
            ));
        }
        let sigma = (&series[..]).std_dev();
        if !sigma.is_finite() {
            return self.degrade("non-finite P&L volatility".to_string());
        }
        let Some(z) = self.z_score() else {
            return self.degrade(format!("invalid confidence {}", self.confidence));
        };
        let var_95 = (z * sigma).abs();

        let snapshot = RiskSnapshot {
            net_exposure,
            sector_deltas,
            var_95,
            timestamp: Utc::now(),
            status: RiskStatus::Ok,
        };
        debug!(
            net_exposure = %snapshot.net_exposure,
            var_95 = snapshot.var_95,
            sigma,
            positions = open.len(),
            "Portfolio risk snapshot"
        );
        self.publish(&snapshot);
        snapshot
    }

    /// Φ⁻¹(1 − confidence).
    fn z_score(&self) -> Option<f64> {
        let normal = Normal::new(0.0, 1.0).ok()?;
        let z = normal.inverse_cdf(1.0 - self.confidence);
        z.is_finite().then_some(z)
    }

    fn degrade(&self, reason: String) -> RiskSnapshot {
        warn!(%reason, "Portfolio risk snapshot degraded");
        Metrics::degraded_event("risk_snapshot");
        RiskSnapshot::degraded(reason)
    }

    fn publish(&self, snapshot: &RiskSnapshot) {
        let deltas: Vec<(&str, f64)> = snapshot
            .sector_deltas
            .iter()
            .map(|(s, d)| (s.as_str(), d.to_f64().unwrap_or(0.0)))
            .collect();
        Metrics::portfolio_risk(
            snapshot.var_95,
            snapshot.net_exposure.to_f64().unwrap_or(0.0),
            &deltas,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sentinel_core::Size;

    fn monitor(history: Vec<f64>) -> PortfolioRiskMonitor {
        let mut config = PortfolioConfig::default();
        config.sectors.insert("AAPL".to_string(), "TECH".to_string());
        config.sectors.insert("MSFT".to_string(), "TECH".to_string());
        config.sectors.insert("JPM".to_string(), "FIN".to_string());
        PortfolioRiskMonitor::new(
            &config,
            Arc::new(InMemoryReturnHistory::from_values(250, history)),
        )
    }

    fn position(symbol: &str, qty: Decimal) -> Position {
        Position::new(Symbol::new(symbol), Size::new(qty), Price::new(dec!(1)))
    }

    fn marks(entries: &[(&str, Decimal)]) -> HashMap<Symbol, Price> {
        entries
            .iter()
            .map(|(s, p)| (Symbol::new(*s), Price::new(*p)))
            .collect()
    }

    #[test]
    fn test_zero_positions_is_all_zero_and_not_degraded() {
        let snapshot = monitor(vec![]).snapshot(&[], &HashMap::new());
        assert_eq!(snapshot.net_exposure, Decimal::ZERO);
        assert!(snapshot.sector_deltas.is_empty());
        assert_eq!(snapshot.var_95, 0.0);
        assert!(!snapshot.is_degraded());
    }

    #[test]
    fn test_flat_positions_count_as_zero() {
        let snapshot = monitor(vec![]).snapshot(&[position("AAPL", dec!(0))], &HashMap::new());
        assert!(!snapshot.is_degraded());
        assert_eq!(snapshot.var_95, 0.0);
    }

    #[test]
    fn test_exposure_and_sector_deltas() {
        let m = monitor(vec![100.0, -100.0, 100.0, -100.0]);
        let positions = [
            position("AAPL", dec!(10)),
            position("MSFT", dec!(-5)),
            position("JPM", dec!(20)),
            position("XOM", dec!(4)),
        ];
        let snapshot = m.snapshot(
            &positions,
            &marks(&[
                ("AAPL", dec!(150)),
                ("MSFT", dec!(300)),
                ("JPM", dec!(100)),
                ("XOM", dec!(50)),
            ]),
        );

        assert!(!snapshot.is_degraded());
        // 1500 - 1500 + 2000 + 200
        assert_eq!(snapshot.net_exposure, dec!(2200));
        assert_eq!(snapshot.sector_deltas["TECH"], dec!(0));
        assert_eq!(snapshot.sector_deltas["FIN"], dec!(2000));
        assert_eq!(snapshot.sector_deltas[OTHER_SECTOR], dec!(200));
    }

    #[test]
    fn test_parametric_var() {
        // sample std of [100, -100, 100, -100] = sqrt(40000/3) ≈ 115.47
        let m = monitor(vec![100.0, -100.0, 100.0, -100.0]);
        let snapshot = m.snapshot(&[position("AAPL", dec!(1))], &marks(&[("AAPL", dec!(150))]));
        let expected = 1.6448536269514722 * (40000.0_f64 / 3.0).sqrt();
        assert!((snapshot.var_95 - expected).abs() < 1e-6);
        assert!(snapshot.var_95 >= 0.0);
        assert!(snapshot.var_exceeds(dec!(150)));
        assert!(!snapshot.var_exceeds(dec!(200)));
    }

    #[test]
    fn test_lookback_limits_history() {
        let mut config = PortfolioConfig::default();
        config.var_lookback_days = 2;
        // Old large swings fall outside the window.
        let history = InMemoryReturnHistory::from_values(10, vec![1e6, -1e6, 10.0, 10.0]);
        let m = PortfolioRiskMonitor::new(&config, Arc::new(history));
        let snapshot = m.snapshot(&[position("AAPL", dec!(1))], &marks(&[("AAPL", dec!(150))]));
        assert_eq!(snapshot.var_95, 0.0);
        assert!(!snapshot.is_degraded());
    }

    #[test]
    fn test_missing_price_degrades() {
        let m = monitor(vec![1.0, 2.0, 3.0]);
        let snapshot = m.snapshot(&[position("AAPL", dec!(10))], &HashMap::new());
        assert!(snapshot.is_degraded());
    }

    #[test]
    fn test_empty_history_degrades() {
        let m = monitor(vec![]);
        let snapshot = m.snapshot(&[position("AAPL", dec!(10))], &marks(&[("AAPL", dec!(150))]));
        assert!(snapshot.is_degraded());
        assert!(matches!(snapshot.status, RiskStatus::Degraded { .. }));
    }

    #[test]
    fn test_history_capacity_evicts_oldest() {
        let history = InMemoryReturnHistory::from_values(3, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.recent(10), vec![2.0, 3.0, 4.0]);
        assert_eq!(history.recent(2), vec![3.0, 4.0]);
    }
}
