//! Deterministic collaborators for paper trading and tests.
//!
//! `FixtureMarketData` serves preset books and last prices, `FixtureAccount`
//! serves preset account values and positions, and `PaperVenue` records
//! orders, acknowledges them and publishes injected fill events. Each can be
//! switched to return a classified failure or to delay its answer.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use sentinel_core::{
    AccountState, BookLevel, BoxFuture, ClientOrderId, CollaboratorError, CollaboratorResult,
    OrderBookSnapshot, OrderRequest, Position, Price, Size, Symbol,
};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::collaborator::{
    AccountSource, ExecutionVenue, FillEvent, FillReport, MarketData, VenueAck,
};
use crate::error::{ExecutorError, ExecutorResult};

/// Build a validated book from `(price, size)` pairs, best level first.
pub fn fixture_book(
    symbol: impl Into<Symbol>,
    bids: &[(Decimal, Decimal)],
    asks: &[(Decimal, Decimal)],
) -> sentinel_core::Result<OrderBookSnapshot> {
    let ladder = |levels: &[(Decimal, Decimal)]| {
        levels
            .iter()
            .map(|(p, s)| BookLevel::new(Price::new(*p), Size::new(*s)))
            .collect::<Vec<_>>()
    };
    OrderBookSnapshot::new(symbol.into(), ladder(bids), ladder(asks), Utc::now(), 0)
}

// ============================================================================
// Fixture file
// ============================================================================

/// Paper-mode market and account state loaded from JSON.
#[derive(Debug, Deserialize)]
pub struct PaperFixture {
    pub account: AccountState,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub prices: HashMap<Symbol, Price>,
    #[serde(default)]
    pub books: Vec<OrderBookSnapshot>,
    /// Daily dollar P&L, oldest first, seeding the VAR history.
    #[serde(default)]
    pub pnl_history: Vec<f64>,
}

impl PaperFixture {
    pub fn load(path: impl AsRef<Path>) -> ExecutorResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExecutorError::Fixture(format!("Failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ExecutorError::Fixture(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Split into market data and account collaborators.
    #[must_use]
    pub fn into_collaborators(self) -> (FixtureMarketData, FixtureAccount) {
        let market = FixtureMarketData::new();
        for (symbol, price) in self.prices {
            market.set_price(symbol, price);
        }
        for book in self.books {
            market.set_book(book);
        }
        let account = FixtureAccount::new(self.account);
        account.set_positions(Ok(self.positions));
        (market, account)
    }
}

// ============================================================================
// FixtureMarketData
// ============================================================================

#[derive(Debug, Default)]
pub struct FixtureMarketData {
    books: Mutex<HashMap<Symbol, OrderBookSnapshot>>,
    prices: Mutex<HashMap<Symbol, Price>>,
    book_delay: Mutex<Option<Duration>>,
    book_error: Mutex<Option<CollaboratorError>>,
}

impl FixtureMarketData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_book(&self, book: OrderBookSnapshot) {
        self.books.lock().insert(book.symbol().clone(), book);
    }

    pub fn set_price(&self, symbol: impl Into<Symbol>, price: Price) {
        self.prices.lock().insert(symbol.into(), price);
    }

    /// Delay every book answer by `delay`.
    pub fn set_book_delay(&self, delay: Option<Duration>) {
        *self.book_delay.lock() = delay;
    }

    pub fn set_book_error(&self, error: Option<CollaboratorError>) {
        *self.book_error.lock() = error;
    }
}

impl MarketData for FixtureMarketData {
    fn fetch_book(&self, symbol: Symbol, depth: usize) -> BoxFuture<'_, CollaboratorResult<OrderBookSnapshot>> {
        Box::pin(async move {
            let delay = *self.book_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let error = self.book_error.lock().clone();
            if let Some(e) = error {
                return Err(e);
            }
            let book = self.books.lock().get(&symbol).map(|b| b.truncated(depth));
            book.ok_or_else(|| CollaboratorError::Transient(format!("no book for {symbol}")))
        })
    }

    fn last_price(&self, symbol: Symbol) -> BoxFuture<'_, CollaboratorResult<Price>> {
        let price = self.prices.lock().get(&symbol).copied();
        Box::pin(async move {
            price.ok_or_else(|| CollaboratorError::Transient(format!("no last price for {symbol}")))
        })
    }
}

// ============================================================================
// FixtureAccount
// ============================================================================

#[derive(Debug)]
pub struct FixtureAccount {
    account: Mutex<CollaboratorResult<AccountState>>,
    positions: Mutex<CollaboratorResult<Vec<Position>>>,
}

impl FixtureAccount {
    #[must_use]
    pub fn new(account: AccountState) -> Self {
        Self {
            account: Mutex::new(Ok(account)),
            positions: Mutex::new(Ok(Vec::new())),
        }
    }

    pub fn set_account(&self, account: CollaboratorResult<AccountState>) {
        *self.account.lock() = account;
    }

    /// Adjust NAV only.
    pub fn set_nav(&self, nav: Price) {
        if let Ok(account) = self.account.lock().as_mut() {
            account.nav = nav;
        }
    }

    pub fn set_positions(&self, positions: CollaboratorResult<Vec<Position>>) {
        *self.positions.lock() = positions;
    }
}

impl AccountSource for FixtureAccount {
    fn account(&self) -> BoxFuture<'_, CollaboratorResult<AccountState>> {
        let account = self.account.lock().clone();
        Box::pin(async move { account })
    }

    fn positions(&self) -> BoxFuture<'_, CollaboratorResult<Vec<Position>>> {
        let positions = self.positions.lock().clone();
        Box::pin(async move { positions })
    }
}

// ============================================================================
// PaperVenue
// ============================================================================

const FILL_CHANNEL_CAPACITY: usize = 1024;

/// Venue that records orders and acknowledges them.
#[derive(Debug)]
pub struct PaperVenue {
    orders: Mutex<Vec<OrderRequest>>,
    cancels: Mutex<Vec<ClientOrderId>>,
    submit_error: Mutex<Option<CollaboratorError>>,
    ack_delay: Mutex<Option<Duration>>,
    report_fills: AtomicBool,
    ack_fill_cap: Mutex<Option<Size>>,
    fills: broadcast::Sender<FillEvent>,
    next_id: AtomicU64,
}

impl Default for PaperVenue {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperVenue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(Vec::new()),
            cancels: Mutex::new(Vec::new()),
            submit_error: Mutex::new(None),
            ack_delay: Mutex::new(None),
            report_fills: AtomicBool::new(true),
            ack_fill_cap: Mutex::new(None),
            fills: broadcast::channel(FILL_CHANNEL_CAPACITY).0,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn set_submit_error(&self, error: Option<CollaboratorError>) {
        *self.submit_error.lock() = error;
    }

    /// Delay every acknowledgment by `delay`.
    pub fn set_ack_delay(&self, delay: Option<Duration>) {
        *self.ack_delay.lock() = delay;
    }

    /// Whether acknowledgments carry a fill.
    pub fn set_report_fills(&self, report: bool) {
        self.report_fills.store(report, Ordering::SeqCst);
    }

    /// Report at most `qty` filled on each acknowledgment.
    pub fn set_ack_fill_cap(&self, qty: Option<Size>) {
        *self.ack_fill_cap.lock() = qty;
    }

    /// Publish an execution for an acknowledged order.
    pub fn report_fill(&self, event: FillEvent) {
        if self.fills.send(event).is_err() {
            debug!("No fill subscribers");
        }
    }

    /// Orders accepted so far, in submission order.
    #[must_use]
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().clone()
    }

    #[must_use]
    pub fn cancels(&self) -> Vec<ClientOrderId> {
        self.cancels.lock().clone()
    }
}

impl ExecutionVenue for PaperVenue {
    fn submit(&self, order: OrderRequest) -> BoxFuture<'_, CollaboratorResult<VenueAck>> {
        Box::pin(async move {
            let delay = *self.ack_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let error = self.submit_error.lock().clone();
            if let Some(e) = error {
                return Err(e);
            }

            let venue_order_id = format!("paper-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            let cap = *self.ack_fill_cap.lock();
            let fill = self.report_fills.load(Ordering::SeqCst).then(|| FillReport {
                filled_qty: cap.map_or(order.qty, |cap| cap.min(order.qty)),
                avg_price: order.limit_price,
            });
            info!(
                cloid = %order.cloid,
                symbol = %order.symbol,
                side = %order.side,
                qty = %order.qty,
                order_type = %order.order_type,
                purpose = order.purpose.as_str(),
                %venue_order_id,
                "Paper order accepted"
            );
            let ack = VenueAck {
                cloid: order.cloid.clone(),
                venue_order_id,
                fill,
            };
            self.orders.lock().push(order);
            Ok(ack)
        })
    }

    fn cancel(&self, cloid: ClientOrderId) -> BoxFuture<'_, CollaboratorResult<()>> {
        Box::pin(async move {
            info!(%cloid, "Paper order cancelled");
            self.cancels.lock().push(cloid);
            Ok(())
        })
    }

    fn subscribe_fills(&self) -> broadcast::Receiver<FillEvent> {
        self.fills.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sentinel_core::{OrderPurpose, OrderSide};

    #[tokio::test]
    async fn test_fixture_book_truncated_to_depth() {
        let market = FixtureMarketData::new();
        market.set_book(
            fixture_book(
                "AAPL",
                &[(dec!(49.99), dec!(100)), (dec!(49.98), dec!(100))],
                &[(dec!(50.01), dec!(100)), (dec!(50.02), dec!(100))],
            )
            .unwrap(),
        );
        let book = market.fetch_book(Symbol::new("AAPL"), 1).await.unwrap();
        assert_eq!(book.asks().len(), 1);
        assert_eq!(book.bids().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_book_is_transient() {
        let market = FixtureMarketData::new();
        let err = market.fetch_book(Symbol::new("AAPL"), 5).await.unwrap_err();
        assert!(err.is_transient());
        assert!(market.last_price(Symbol::new("AAPL")).await.is_err());
    }

    #[tokio::test]
    async fn test_paper_venue_records_and_fills() {
        let venue = PaperVenue::new();
        let order = OrderRequest::market(
            Symbol::new("AAPL"),
            OrderSide::Buy,
            Size::new(dec!(10)),
            "primary",
            OrderPurpose::Entry,
        );
        let ack = venue.submit(order.clone()).await.unwrap();
        assert_eq!(ack.cloid, order.cloid);
        assert!(ack.is_complete_fill(order.qty));
        assert_eq!(venue.orders(), vec![order.clone()]);

        venue.set_ack_fill_cap(Some(Size::new(dec!(1))));
        let ack = venue.submit(order.clone()).await.unwrap();
        assert_eq!(ack.fill.unwrap().filled_qty, Size::new(dec!(1)));
        assert!(!ack.is_complete_fill(order.qty));

        venue.set_report_fills(false);
        let ack = venue.submit(order.clone()).await.unwrap();
        assert!(ack.fill.is_none());
        assert!(!ack.is_complete_fill(order.qty));
    }

    #[tokio::test]
    async fn test_paper_venue_publishes_fill_events() {
        let venue = PaperVenue::new();
        let mut fills = venue.subscribe_fills();
        let event = FillEvent {
            cloid: ClientOrderId::new(),
            filled_qty: Size::new(dec!(10)),
            avg_price: Some(Price::new(dec!(50))),
            done: true,
        };
        venue.report_fill(event.clone());
        assert_eq!(fills.recv().await.unwrap(), event);
    }

    #[test]
    fn test_fixture_parses() {
        let fixture: PaperFixture = serde_json::from_str(
            r#"{
                "account": {"nav": "100000", "margin_excess": "50000",
                            "gross_position_value": "10000", "sma": "20000",
                            "buying_power": "200000"},
                "positions": [{"symbol": "AAPL", "qty": "10", "avg_price": "150"}],
                "prices": {"AAPL": "150.25"},
                "books": [{"symbol": "AAPL", "captured_at": "2024-03-20T14:00:00Z",
                           "bids": [{"price": "150.20", "size": "300"}],
                           "asks": [{"price": "150.30", "size": "200"}]}],
                "pnl_history": [120.0, -80.5]
            }"#,
        )
        .unwrap();
        assert!(fixture.account.is_valid());
        assert_eq!(fixture.pnl_history, vec![120.0, -80.5]);
        let (market, account) = fixture.into_collaborators();
        assert!(market.books.lock().contains_key(&Symbol::new("AAPL")));
        assert_eq!(account.positions.lock().as_ref().unwrap().len(), 1);
    }
}
