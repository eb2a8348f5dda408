//! Pipeline output types.
//!
//! This module provides types for:
//! - Final order instructions handed to the execution venue
//! - Decision outcomes (`SKIPPED`, `FLATTENED`, `EXECUTED`) and reason codes

use serde::{Deserialize, Serialize};

use crate::order::{ClientOrderId, OrderSide, OrderType, Symbol};
use crate::{Price, Size};

// ============================================================================
// Order Instructions
// ============================================================================

/// Why an order was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPurpose {
    /// Order derived from a trading signal.
    Entry,
    /// Companion beta hedge.
    Hedge,
    /// Forced exit issued by flatten-all.
    Flatten,
}

impl OrderPurpose {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Hedge => "hedge",
            Self::Flatten => "flatten",
        }
    }
}

/// Order instruction submitted to the execution venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Client order ID for idempotency and cancellation.
    pub cloid: ClientOrderId,
    pub symbol: Symbol,
    pub side: OrderSide,
    /// Whole shares, always positive.
    pub qty: Size,
    pub order_type: OrderType,
    /// Limit price; `None` for market orders.
    pub limit_price: Option<Price>,
    pub stop: Option<Price>,
    pub take: Option<Price>,
    pub venue: String,
    pub purpose: OrderPurpose,
    /// Creation timestamp (Unix milliseconds).
    pub created_at: u64,
}

impl OrderRequest {
    /// Market order with no attached levels (hedges and flattens).
    #[must_use]
    pub fn market(
        symbol: Symbol,
        side: OrderSide,
        qty: Size,
        venue: impl Into<String>,
        purpose: OrderPurpose,
    ) -> Self {
        Self {
            cloid: ClientOrderId::new(),
            symbol,
            side,
            qty,
            order_type: OrderType::Market,
            limit_price: None,
            stop: None,
            take: None,
            venue: venue.into(),
            purpose,
            created_at: crate::now_ms(),
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Terminal state of one decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeStatus {
    Skipped,
    Flattened,
    Executed,
}

impl OutcomeStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "SKIPPED",
            Self::Flattened => "FLATTENED",
            Self::Executed => "EXECUTED",
        }
    }
}

/// Reason attached to an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Order submitted and acknowledged.
    Executed,
    /// Signal proposed no trade.
    HoldSignal,
    /// Session kill-switch is tripped.
    KillSwitch,
    /// High-impact macro event scheduled today.
    MacroEvent,
    /// Sizing produced a zero order (margin buffer, invalid inputs, unavailable account).
    ZeroSize,
    /// Last traded price unavailable for sizing.
    PriceUnavailable,
    /// Book fetch missed its deadline.
    BookTimeout,
    /// Book fetch failed or returned an empty side.
    BookUnavailable,
    /// Estimated slippage above the configured maximum.
    SlippageLimit,
    /// Adverse-selection cost above the configured maximum.
    AdverseSelection,
    /// Reg-T SMA ratio below minimum.
    RegTBreach,
    /// Portfolio VAR above maximum.
    VarBreach,
    /// Portfolio risk could not be computed (treated as a breach).
    RiskDegraded,
    /// A flatten-all is running; new entries are refused.
    FlattenInProgress,
    /// Order acknowledged after a flatten superseded it; cancelled.
    Superseded,
    /// Venue rejected or failed the submission.
    SubmitFailed,
    /// Positions closed because the process is stopping.
    Shutdown,
    /// Positions closed ahead of the market close.
    SessionClose,
}

impl ReasonCode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executed => "executed",
            Self::HoldSignal => "hold_signal",
            Self::KillSwitch => "kill_switch",
            Self::MacroEvent => "macro_event",
            Self::ZeroSize => "zero_size",
            Self::PriceUnavailable => "price_unavailable",
            Self::BookTimeout => "book_timeout",
            Self::BookUnavailable => "book_unavailable",
            Self::SlippageLimit => "slippage_limit",
            Self::AdverseSelection => "adverse_selection",
            Self::RegTBreach => "reg_t_breach",
            Self::VarBreach => "var_breach",
            Self::RiskDegraded => "risk_degraded",
            Self::FlattenInProgress => "flatten_in_progress",
            Self::Superseded => "superseded",
            Self::SubmitFailed => "submit_failed",
            Self::Shutdown => "shutdown",
            Self::SessionClose => "session_close",
        }
    }
}

/// Result of processing one trading signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub symbol: Symbol,
    pub status: OutcomeStatus,
    pub reason: ReasonCode,
    pub order: Option<OrderRequest>,
    pub hedge_order: Option<OrderRequest>,
}

impl ExecutionOutcome {
    /// Create a skipped outcome with the given reason.
    #[must_use]
    pub fn skipped(symbol: Symbol, reason: ReasonCode) -> Self {
        Self {
            symbol,
            status: OutcomeStatus::Skipped,
            reason,
            order: None,
            hedge_order: None,
        }
    }

    /// Create a flattened outcome with the given reason.
    #[must_use]
    pub fn flattened(symbol: Symbol, reason: ReasonCode) -> Self {
        Self {
            symbol,
            status: OutcomeStatus::Flattened,
            reason,
            order: None,
            hedge_order: None,
        }
    }

    /// Create an executed outcome with the entry order and optional hedge.
    #[must_use]
    pub fn executed(order: OrderRequest, hedge_order: Option<OrderRequest>) -> Self {
        Self {
            symbol: order.symbol.clone(),
            status: OutcomeStatus::Executed,
            reason: ReasonCode::Executed,
            order: Some(order),
            hedge_order,
        }
    }

    /// Attach the order that was built before the cycle ended.
    #[must_use]
    pub fn with_order(mut self, order: OrderRequest) -> Self {
        self.order = Some(order);
        self
    }

    #[must_use]
    pub fn is_executed(&self) -> bool {
        self.status == OutcomeStatus::Executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_executed_outcome_carries_symbol() {
        let order = OrderRequest::market(
            Symbol::new("AAPL"),
            OrderSide::Buy,
            Size::new(dec!(10)),
            "primary",
            OrderPurpose::Entry,
        );
        let outcome = ExecutionOutcome::executed(order, None);
        assert!(outcome.is_executed());
        assert_eq!(outcome.symbol.as_str(), "AAPL");
        assert_eq!(outcome.reason, ReasonCode::Executed);
    }

    #[test]
    fn test_skipped_outcome_has_no_orders() {
        let outcome = ExecutionOutcome::skipped(Symbol::new("AAPL"), ReasonCode::BookTimeout);
        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert!(outcome.order.is_none());
        assert!(outcome.hedge_order.is_none());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&OutcomeStatus::Flattened).unwrap();
        assert_eq!(json, "\"FLATTENED\"");
        assert_eq!(ReasonCode::RegTBreach.as_str(), "reg_t_breach");
        assert_eq!(ReasonCode::SessionClose.as_str(), "session_close");
    }
}
