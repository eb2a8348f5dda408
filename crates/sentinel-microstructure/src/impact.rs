//! Book-walk market impact estimate.
//!
//! Walks cumulative size on the ladder the order consumes and reports the
//! price of the first level where cumulative size reaches the order quantity.
//! The temporary/permanent impact terms are auxiliary outputs; they are not
//! folded into `expected_price`.

use rust_decimal::Decimal;
use sentinel_core::{OrderBookSnapshot, OrderSide, Price, Size};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::ImpactConfig;

/// Result of walking the book for one candidate order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactEstimate {
    /// Price of the level where the order completes, or the worst level when swept.
    pub expected_price: Price,
    /// Unused fraction of cumulative depth at the completing level, in [0, 1].
    /// Zero when the book is swept.
    pub participation: Decimal,
    /// Adverse move from best to expected price, in bps (never negative).
    pub slippage_bps: Decimal,
    /// γ · qty / total depth.
    pub temporary_impact: Decimal,
    /// η · qty / total depth.
    pub permanent_impact: Decimal,
    /// True when qty exceeded total depth.
    pub swept: bool,
}

/// Book-walk impact estimator.
#[derive(Debug, Clone)]
pub struct ImpactEstimator {
    gamma: Decimal,
    eta: Decimal,
}

impl ImpactEstimator {
    #[must_use]
    pub fn new(gamma: Decimal, eta: Decimal) -> Self {
        Self { gamma, eta }
    }

    #[must_use]
    pub fn from_config(config: &ImpactConfig) -> Self {
        Self::new(config.impact_gamma, config.impact_eta)
    }

    /// Estimate fill price for `qty` on `side` (asks for BUY, bids for SELL).
    ///
    /// Returns `None` when the consumed ladder is empty.
    #[must_use]
    pub fn estimate(&self, qty: Size, side: OrderSide, book: &OrderBookSnapshot) -> Option<ImpactEstimate> {
        let levels = book.side(side);
        let best = levels.first()?.price;
        let worst = levels.last()?.price;

        let qty = qty.inner();
        let mut cumulative = Decimal::ZERO;
        let mut hit = None;
        for level in levels {
            cumulative += level.size.inner();
            if hit.is_none() && cumulative >= qty {
                hit = Some((level.price, cumulative));
            }
        }
        let total = cumulative;

        let (expected_price, participation, swept) = match hit {
            Some((price, cum)) => (price, (cum - qty) / cum, false),
            None => (worst, Decimal::ZERO, true),
        };

        // Book is validated positive, so `best` is non-zero.
        let raw_bps = expected_price.bps_from(best).unwrap_or(Decimal::ZERO);
        let slippage_bps = match side {
            OrderSide::Buy => raw_bps,
            OrderSide::Sell => -raw_bps,
        };

        let estimate = ImpactEstimate {
            expected_price,
            participation,
            slippage_bps,
            temporary_impact: self.gamma * qty / total,
            permanent_impact: self.eta * qty / total,
            swept,
        };
        trace!(symbol = %book.symbol(), ?side, %qty, ?estimate, "impact estimate");
        Some(estimate)
    }
}

impl Default for ImpactEstimator {
    fn default() -> Self {
        Self::from_config(&ImpactConfig::default())
    }
}
