//! Depth-limited order book snapshot.
//!
//! A single `OrderBookSnapshot` type is produced by both the live feed adapter
//! and the deterministic fixtures used in tests and paper mode. Snapshots are
//! validated on construction and immutable afterwards; a snapshot lives for one
//! decision cycle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::order::{OrderSide, Symbol};
use crate::{Price, Size};

/// One price level of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub size: Size,
}

impl BookLevel {
    #[must_use]
    pub fn new(price: Price, size: Size) -> Self {
        Self { price, size }
    }
}

/// Wire shape accepted from collaborators before validation.
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    symbol: Symbol,
    bids: Vec<BookLevel>,
    asks: Vec<BookLevel>,
    captured_at: DateTime<Utc>,
    #[serde(default)]
    latency_us: u64,
}

impl TryFrom<RawSnapshot> for OrderBookSnapshot {
    type Error = CoreError;

    fn try_from(raw: RawSnapshot) -> Result<Self> {
        Self::new(raw.symbol, raw.bids, raw.asks, raw.captured_at, raw.latency_us)
    }
}

/// Validated bid/ask ladders for one instrument.
///
/// Invariants (checked by [`OrderBookSnapshot::new`]):
/// - bid prices strictly decreasing, ask prices strictly increasing
///   (strictly moving away from mid on each side)
/// - every price and size is positive
/// - best bid below best ask when both sides are present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshot")]
pub struct OrderBookSnapshot {
    symbol: Symbol,
    bids: Vec<BookLevel>,
    asks: Vec<BookLevel>,
    captured_at: DateTime<Utc>,
    latency_us: u64,
}

impl OrderBookSnapshot {
    /// Build a snapshot, rejecting unordered ladders and crossed or locked books.
    pub fn new(
        symbol: Symbol,
        bids: Vec<BookLevel>,
        asks: Vec<BookLevel>,
        captured_at: DateTime<Utc>,
        latency_us: u64,
    ) -> Result<Self> {
        validate_side(&bids, OrderSide::Sell)?;
        validate_side(&asks, OrderSide::Buy)?;
        if let (Some(bid), Some(ask)) = (bids.first(), asks.first()) {
            if bid.price >= ask.price {
                return Err(CoreError::InvalidBook(format!(
                    "crossed book: best bid {} >= best ask {}",
                    bid.price, ask.price
                )));
            }
        }
        Ok(Self {
            symbol,
            bids,
            asks,
            captured_at,
            latency_us,
        })
    }

    #[must_use]
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    #[must_use]
    pub fn bids(&self) -> &[BookLevel] {
        &self.bids
    }

    #[must_use]
    pub fn asks(&self) -> &[BookLevel] {
        &self.asks
    }

    #[must_use]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    #[must_use]
    pub fn latency_us(&self) -> u64 {
        self.latency_us
    }

    /// Ladder an order on `side` trades against: asks for a buy, bids for a sell.
    #[must_use]
    pub fn side(&self, side: OrderSide) -> &[BookLevel] {
        match side {
            OrderSide::Buy => &self.asks,
            OrderSide::Sell => &self.bids,
        }
    }

    /// Best level an order on `side` would join or cross.
    #[must_use]
    pub fn best(&self, side: OrderSide) -> Option<BookLevel> {
        self.side(side).first().copied()
    }

    /// Total resting size on one ladder.
    #[must_use]
    pub fn total_size(&self, side: OrderSide) -> Size {
        Size::new(self.side(side).iter().map(|l| l.size.inner()).sum::<Decimal>())
    }

    /// Copy limited to the top `depth` levels of each side.
    #[must_use]
    pub fn truncated(&self, depth: usize) -> Self {
        Self {
            symbol: self.symbol.clone(),
            bids: self.bids.iter().take(depth).copied().collect(),
            asks: self.asks.iter().take(depth).copied().collect(),
            captured_at: self.captured_at,
            latency_us: self.latency_us,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// `side` is the order side that consumes this ladder.
fn validate_side(levels: &[BookLevel], side: OrderSide) -> Result<()> {
    for level in levels {
        if !level.price.is_positive() {
            return Err(CoreError::InvalidBook(format!(
                "non-positive price {}",
                level.price
            )));
        }
        if !level.size.is_positive() {
            return Err(CoreError::InvalidBook(format!(
                "non-positive size {} at {}",
                level.size, level.price
            )));
        }
    }
    for pair in levels.windows(2) {
        let ordered = match side {
            OrderSide::Buy => pair[1].price > pair[0].price,
            OrderSide::Sell => pair[1].price < pair[0].price,
        };
        if !ordered {
            return Err(CoreError::InvalidBook(format!(
                "{} ladder not strictly ordered at {} -> {}",
                if side == OrderSide::Buy { "ask" } else { "bid" },
                pair[0].price,
                pair[1].price
            )));
        }
    }
    Ok(())
}
