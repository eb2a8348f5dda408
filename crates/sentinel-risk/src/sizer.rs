//! Margin-buffered position sizing.
//!
//! qty = trunc((nav × h) / (price × h)) where h is the hard-stop fraction.
//! The h terms cancel, so the quantity is nav / price in whole shares; the
//! formula is kept in this form and `max_position_pct` is reported alongside
//! rather than applied as a cap.

use rust_decimal::Decimal;
use sentinel_core::{OrderAction, OrderSide, Price, Size};
use sentinel_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RiskConfig;

/// Sized order proposal.
///
/// Invariant: `qty` is zero exactly when `action` is `Hold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizedOrder {
    pub action: OrderAction,
    pub qty: Size,
    pub limit: Price,
    pub stop: Price,
    pub take: Price,
}

impl SizedOrder {
    /// Zero order with every level at `price`.
    #[must_use]
    pub fn hold(price: Price) -> Self {
        Self {
            action: OrderAction::Hold,
            qty: Size::ZERO,
            limit: price,
            stop: price,
            take: price,
        }
    }

    #[must_use]
    pub fn is_hold(&self) -> bool {
        self.action == OrderAction::Hold
    }

    /// Notional at the limit price.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.qty.notional(self.limit)
    }
}

#[derive(Debug, Clone)]
pub struct PositionSizer {
    hard_stop_pct: Decimal,
    margin_buffer_pct: Decimal,
    max_position_pct: Decimal,
}

impl PositionSizer {
    #[must_use]
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            hard_stop_pct: config.hard_stop_pct,
            margin_buffer_pct: config.margin_buffer_pct,
            max_position_pct: config.max_position_pct,
        }
    }

    /// Size a BUY.
    #[must_use]
    pub fn size(&self, nav: Price, price: Price, margin_usage: Decimal) -> SizedOrder {
        self.size_for(OrderSide::Buy, nav, price, margin_usage)
    }

    /// Size an order on `side`. SELL mirrors the levels: stop above, take below.
    ///
    /// Degrades to HOLD when nav or price is not positive, when margin usage
    /// exceeds `1 − margin_buffer`, or when the quantity truncates to zero.
    #[must_use]
    pub fn size_for(&self, side: OrderSide, nav: Price, price: Price, margin_usage: Decimal) -> SizedOrder {
        if !nav.is_positive() || !price.is_positive() {
            warn!(%nav, %price, "Sizing rejected: non-positive nav or price");
            return SizedOrder::hold(price);
        }

        if margin_usage > Decimal::ONE - self.margin_buffer_pct {
            warn!(
                %margin_usage,
                margin_buffer_pct = %self.margin_buffer_pct,
                "Margin buffer breach"
            );
            Metrics::margin_breach();
            return SizedOrder::hold(price);
        }

        let h = self.hard_stop_pct;
        let risk_amount = nav.inner() * h;
        let per_share_risk = price.inner() * h;
        if per_share_risk.is_zero() {
            return SizedOrder::hold(price);
        }
        let qty = Size::new(risk_amount / per_share_risk).whole();
        if !qty.is_positive() {
            return SizedOrder::hold(price);
        }

        let (stop, take) = match side {
            OrderSide::Buy => (
                price * (Decimal::ONE - h),
                price * (Decimal::ONE + Decimal::TWO * h),
            ),
            OrderSide::Sell => (
                price * (Decimal::ONE + h),
                price * (Decimal::ONE - Decimal::TWO * h),
            ),
        };

        let order = SizedOrder {
            action: OrderAction::from(side),
            qty,
            limit: price,
            stop,
            take,
        };
        debug!(?order, %nav, %margin_usage, "Sized order");
        order
    }

    /// Notional limit implied by `max_position_pct`.
    #[must_use]
    pub fn max_position_notional(&self, nav: Price) -> Decimal {
        nav.inner() * self.max_position_pct
    }

    /// Whether `order` exceeds the notional limit for `nav`.
    #[must_use]
    pub fn exceeds_position_limit(&self, order: &SizedOrder, nav: Price) -> bool {
        order.notional() > self.max_position_notional(nav)
    }
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self::new(&RiskConfig::default())
    }
}
