//! Beta hedge against a broad-market proxy.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sentinel_core::{OrderSide, Size, Symbol};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::HedgeConfig;

/// Offsetting trade in the hedge instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HedgeInstruction {
    pub instrument: Symbol,
    /// Signed: positive buys, negative sells.
    pub qty: i64,
}

impl HedgeInstruction {
    #[must_use]
    pub fn side(&self) -> OrderSide {
        if self.qty > 0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }

    /// Unsigned order size.
    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(Decimal::from(self.qty.unsigned_abs()))
    }
}

#[derive(Debug, Clone)]
pub struct HedgeCalculator {
    beta: Decimal,
    instrument: Symbol,
    enabled: bool,
}

impl HedgeCalculator {
    #[must_use]
    pub fn new(config: &HedgeConfig) -> Self {
        Self {
            beta: config.hedge_beta,
            instrument: Symbol::new(config.instrument.clone()),
            enabled: config.enabled,
        }
    }

    #[must_use]
    pub fn instrument(&self) -> &Symbol {
        &self.instrument
    }

    /// round(−qty × beta), half away from zero. Saturates at the i64 range.
    #[must_use]
    pub fn hedge_qty(qty: Decimal, beta: Decimal) -> i64 {
        let saturated = if qty.is_sign_negative() == beta.is_sign_negative() {
            i64::MIN
        } else {
            i64::MAX
        };
        let Some(product) = (-qty).checked_mul(beta) else {
            return saturated;
        };
        product
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(saturated)
    }

    /// Hedge for a fill of signed quantity `signed_qty` (positive = bought).
    ///
    /// `None` when hedging is disabled or the rounded quantity is zero.
    #[must_use]
    pub fn instruction(&self, signed_qty: Size) -> Option<HedgeInstruction> {
        if !self.enabled {
            return None;
        }
        let qty = Self::hedge_qty(signed_qty.inner(), self.beta);
        if qty == 0 {
            return None;
        }
        debug!(instrument = %self.instrument, qty, beta = %self.beta, "Hedge computed");
        Some(HedgeInstruction {
            instrument: self.instrument.clone(),
            qty,
        })
    }
}
