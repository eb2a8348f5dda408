//! Passive/aggressive routing with venue fee lookup.

use std::collections::HashMap;
use std::fmt;

use rust_decimal::Decimal;
use sentinel_core::{OrderBookSnapshot, OrderSide, OrderType, Price, Size};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RouterConfig;

/// Execution style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouteStyle {
    /// Rest at the joined level.
    Passive,
    /// Cross the spread.
    Aggressive,
}

impl RouteStyle {
    /// Order type used for the final instruction.
    #[must_use]
    pub fn order_type(&self) -> OrderType {
        match self {
            Self::Passive => OrderType::Limit,
            Self::Aggressive => OrderType::Market,
        }
    }
}

impl fmt::Display for RouteStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passive => write!(f, "PASSIVE"),
            Self::Aggressive => write!(f, "AGGRESSIVE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub style: RouteStyle,
    pub venue: String,
    pub limit_price: Price,
    pub fee_bps: Decimal,
    /// Size ahead at the joined level; zero for aggressive routes.
    pub queue_ahead: Size,
}

#[derive(Debug, Clone)]
pub struct SmartRouter {
    default_venue: String,
    default_fee_bps: Decimal,
    venue_fees: HashMap<String, Decimal>,
}

impl SmartRouter {
    #[must_use]
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            default_venue: config.default_venue.clone(),
            default_fee_bps: config.default_fee_bps,
            venue_fees: config.venue_fees.clone(),
        }
    }

    #[must_use]
    pub fn default_venue(&self) -> &str {
        &self.default_venue
    }

    /// Fee for `venue`, falling back to the configured default.
    #[must_use]
    pub fn fee_bps(&self, venue: &str) -> Decimal {
        self.venue_fees
            .get(venue)
            .copied()
            .unwrap_or(self.default_fee_bps)
    }

    /// Join the top level on the consumed side (asks for BUY, bids for SELL).
    ///
    /// PASSIVE only when `qty < 0.5 × level size`; equality routes AGGRESSIVE.
    /// An empty side behaves as a zero-size level at price zero and routes
    /// AGGRESSIVE.
    #[must_use]
    pub fn route(&self, book: &OrderBookSnapshot, side: OrderSide, qty: Size) -> Route {
        let (price, level_size) = book
            .best(side)
            .map(|l| (l.price, l.size))
            .unwrap_or((Price::ZERO, Size::ZERO));

        let half_level = level_size.inner() / Decimal::TWO;
        let venue = self.default_venue.clone();
        let fee_bps = self.fee_bps(&venue);

        let route = if qty.inner() < half_level {
            Route {
                style: RouteStyle::Passive,
                venue,
                limit_price: price,
                fee_bps,
                queue_ahead: level_size,
            }
        } else {
            Route {
                style: RouteStyle::Aggressive,
                venue,
                limit_price: price,
                fee_bps,
                queue_ahead: Size::ZERO,
            }
        };
        debug!(
            symbol = %book.symbol(),
            %side,
            %qty,
            style = %route.style,
            venue = %route.venue,
            "routed"
        );
        route
    }
}

impl Default for SmartRouter {
    fn default() -> Self {
        Self::new(&RouterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use sentinel_core::{BookLevel, Symbol};

    fn book_with_top_ask(size: Decimal) -> OrderBookSnapshot {
        OrderBookSnapshot::new(
            Symbol::new("AAPL"),
            vec![BookLevel::new(Price::new(dec!(49.99)), Size::new(dec!(500)))],
            vec![BookLevel::new(Price::new(dec!(50.01)), Size::new(size))],
            Utc::now(),
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_small_order_routes_passive() {
        let route = SmartRouter::default().route(&book_with_top_ask(dec!(100)), OrderSide::Buy, Size::new(dec!(49)));
        assert_eq!(route.style, RouteStyle::Passive);
        assert_eq!(route.queue_ahead, Size::new(dec!(100)));
        assert_eq!(route.limit_price, Price::new(dec!(50.01)));
    }

    #[test]
    fn test_half_level_boundary_routes_aggressive() {
        let route = SmartRouter::default().route(&book_with_top_ask(dec!(100)), OrderSide::Buy, Size::new(dec!(50)));
        assert_eq!(route.style, RouteStyle::Aggressive);
        assert_eq!(route.queue_ahead, Size::ZERO);
    }

    #[test]
    fn test_sell_joins_bid() {
        let route = SmartRouter::default().route(&book_with_top_ask(dec!(100)), OrderSide::Sell, Size::new(dec!(100)));
        assert_eq!(route.style, RouteStyle::Passive);
        assert_eq!(route.limit_price, Price::new(dec!(49.99)));
        assert_eq!(route.queue_ahead, Size::new(dec!(500)));
    }

    #[test]
    fn test_venue_fee_lookup() {
        let mut config = RouterConfig::default();
        config.default_venue = "arca".to_string();
        config.venue_fees.insert("arca".to_string(), dec!(0.2));
        let router = SmartRouter::new(&config);

        let route = router.route(&book_with_top_ask(dec!(100)), OrderSide::Buy, Size::new(dec!(10)));
        assert_eq!(route.venue, "arca");
        assert_eq!(route.fee_bps, dec!(0.2));
        assert_eq!(router.fee_bps("unknown"), dec!(0.3));
    }

    #[test]
    fn test_empty_side_routes_aggressive() {
        let book = OrderBookSnapshot::new(Symbol::new("AAPL"), vec![], vec![], Utc::now(), 0).unwrap();
        let route = SmartRouter::default().route(&book, OrderSide::Buy, Size::new(dec!(1)));
        assert_eq!(route.style, RouteStyle::Aggressive);
        assert_eq!(route.limit_price, Price::ZERO);
    }

    #[test]
    fn test_style_order_type() {
        assert_eq!(RouteStyle::Passive.order_type(), OrderType::Limit);
        assert_eq!(RouteStyle::Aggressive.order_type(), OrderType::Market);
    }
}
