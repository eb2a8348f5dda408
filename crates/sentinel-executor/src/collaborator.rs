//! Collaborator traits consumed by the coordinator.
//!
//! Market data, the account and the execution venue sit behind these traits so
//! the live adapters and the paper fixtures are interchangeable. Every method
//! returns a classified [`CollaboratorResult`]. Executions that arrive after
//! the acknowledgment are pushed on the venue's [`FillEvent`] stream.

use sentinel_core::{
    AccountState, BoxFuture, ClientOrderId, CollaboratorResult, OrderBookSnapshot, OrderRequest,
    Position, Price, Size, Symbol,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Order book and last-trade source.
pub trait MarketData: Send + Sync {
    /// One book snapshot with up to `depth` levels per side.
    fn fetch_book(&self, symbol: Symbol, depth: usize) -> BoxFuture<'_, CollaboratorResult<OrderBookSnapshot>>;

    /// Last traded price.
    fn last_price(&self, symbol: Symbol) -> BoxFuture<'_, CollaboratorResult<Price>>;
}

/// Account values and open positions.
pub trait AccountSource: Send + Sync {
    fn account(&self) -> BoxFuture<'_, CollaboratorResult<AccountState>>;

    fn positions(&self) -> BoxFuture<'_, CollaboratorResult<Vec<Position>>>;
}

/// Execution reported with an acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillReport {
    pub filled_qty: Size,
    pub avg_price: Option<Price>,
}

/// Venue acknowledgment of a submitted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueAck {
    pub cloid: ClientOrderId,
    pub venue_order_id: String,
    /// Present when the venue reports an execution with the acknowledgment.
    pub fill: Option<FillReport>,
}

impl VenueAck {
    /// Whether the acknowledgment reports `order_qty` or more filled.
    #[must_use]
    pub fn is_complete_fill(&self, order_qty: Size) -> bool {
        self.fill.is_some_and(|f| f.filled_qty >= order_qty)
    }
}

/// Execution update for a previously acknowledged order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillEvent {
    pub cloid: ClientOrderId,
    /// Cumulative quantity filled so far.
    pub filled_qty: Size,
    pub avg_price: Option<Price>,
    /// No further executions follow: filled, cancelled or expired.
    pub done: bool,
}

/// Order transmission.
pub trait ExecutionVenue: Send + Sync {
    fn submit(&self, order: OrderRequest) -> BoxFuture<'_, CollaboratorResult<VenueAck>>;

    fn cancel(&self, cloid: ClientOrderId) -> BoxFuture<'_, CollaboratorResult<()>>;

    /// Executions reported after the acknowledgment.
    fn subscribe_fills(&self) -> broadcast::Receiver<FillEvent>;
}
