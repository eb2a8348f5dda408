//! Core domain types for the sentinel execution gate.
//!
//! This crate provides the value types exchanged by every stage of the
//! signal-to-order pipeline:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `OrderBookSnapshot`: Depth-limited, validated bid/ask ladders
//! - `AccountState`, `Position`: Account collaborator views
//! - `TradingSignal`: Input from the signal provider
//! - `OrderRequest`, `ExecutionOutcome`: Pipeline output
//! - `CollaboratorError`: Typed failures at external boundaries

pub mod account;
pub mod book;
pub mod collaborator;
pub mod decimal;
pub mod error;
pub mod execution;
pub mod order;
pub mod signal;

pub use account::{AccountState, Position};
pub use book::{BookLevel, OrderBookSnapshot};
pub use collaborator::{BoxFuture, CollaboratorError, CollaboratorResult};
pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use execution::{ExecutionOutcome, OrderPurpose, OrderRequest, OutcomeStatus, ReasonCode};
pub use order::{ClientOrderId, OrderAction, OrderSide, OrderType, Symbol};
pub use signal::TradingSignal;

/// Current wall-clock time in Unix milliseconds.
#[inline]
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
