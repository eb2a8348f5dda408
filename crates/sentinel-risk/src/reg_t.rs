//! Reg-T special memorandum account (SMA) buffer.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sentinel_core::{AccountState, Price};
use sentinel_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::RegTConfig;

/// Equity floor used as the ratio denominator.
const EQUITY_FLOOR: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegTSnapshot {
    pub sma: Price,
    /// sma / max(equity, 1e-9).
    pub sma_ratio: Decimal,
    pub buying_power: Price,
    /// True when `sma_ratio` is strictly below the configured minimum.
    pub breach: bool,
}

#[derive(Debug, Clone)]
pub struct RegTMonitor {
    min_sma_ratio: Decimal,
}

impl RegTMonitor {
    #[must_use]
    pub fn new(config: &RegTConfig) -> Self {
        Self {
            min_sma_ratio: config.min_sma_ratio,
        }
    }

    #[must_use]
    pub fn min_sma_ratio(&self) -> Decimal {
        self.min_sma_ratio
    }

    #[must_use]
    pub fn snapshot(&self, account: &AccountState) -> RegTSnapshot {
        let equity = account.nav.inner().max(EQUITY_FLOOR);
        let sma_ratio = account.sma.inner() / equity;
        let breach = sma_ratio < self.min_sma_ratio;

        Metrics::sma_ratio(sma_ratio.to_f64().unwrap_or(0.0));
        if breach {
            warn!(
                sma = %account.sma,
                nav = %account.nav,
                %sma_ratio,
                min_sma_ratio = %self.min_sma_ratio,
                "Reg-T SMA buffer breached"
            );
        }

        RegTSnapshot {
            sma: account.sma,
            sma_ratio,
            buying_power: account.buying_power,
            breach,
        }
    }
}
