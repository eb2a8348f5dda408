//! Adverse-selection cost from book imbalance.

use rust_decimal::Decimal;
use sentinel_core::{OrderBookSnapshot, OrderSide, Price, Size};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::MicroConfig;

/// Guards the imbalance denominator against an empty book.
const IMBALANCE_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicroPriceResult {
    /// Best price on the joined side.
    pub fair_price: Price,
    /// adverse_alpha × |imbalance|.
    pub cost_bps: Decimal,
    /// Size resting at the joined level.
    pub queue_ahead: Size,
    /// (bid size − ask size) / (total size + ε), in [-1, 1].
    pub imbalance: Decimal,
}

#[derive(Debug, Clone)]
pub struct MicroPriceEngine {
    adverse_alpha: Decimal,
}

impl MicroPriceEngine {
    #[must_use]
    pub fn new(adverse_alpha: Decimal) -> Self {
        Self { adverse_alpha }
    }

    #[must_use]
    pub fn from_config(config: &MicroConfig) -> Self {
        Self::new(config.adverse_alpha)
    }

    /// Score `desired_qty` (positive = buy, otherwise sell) against `book`.
    ///
    /// Fair price and queue-ahead come from the best ask for a buy and the best
    /// bid for a sell. Returns `None` when that side is empty.
    #[must_use]
    pub fn compute(&self, book: &OrderBookSnapshot, desired_qty: Size) -> Option<MicroPriceResult> {
        let bid_total = book.total_size(OrderSide::Sell).inner();
        let ask_total = book.total_size(OrderSide::Buy).inner();
        let imbalance = (bid_total - ask_total) / (bid_total + ask_total + IMBALANCE_EPSILON);
        let cost_bps = self.adverse_alpha * imbalance.abs();

        let joined = if desired_qty.is_positive() {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let level = book.best(joined)?;

        let result = MicroPriceResult {
            fair_price: level.price,
            cost_bps,
            queue_ahead: level.size,
            imbalance,
        };
        trace!(symbol = %book.symbol(), ?result, "micro-price");
        Some(result)
    }
}

impl Default for MicroPriceEngine {
    fn default() -> Self {
        Self::from_config(&MicroConfig::default())
    }
}
