//! Forced exit of every open position.

use sentinel_core::{OrderPurpose, OrderRequest, OrderSide, ReasonCode};
use sentinel_telemetry::Metrics;
use tracing::{error, info, warn};

use crate::collaborator::{AccountSource, ExecutionVenue};
use crate::ledger::OrderLedger;

/// Summary of one completed flatten.
#[derive(Debug, Clone, Default)]
pub struct FlattenReport {
    /// Closing orders the venue accepted.
    pub orders: Vec<OrderRequest>,
    /// Unacknowledged orders cancelled.
    pub cancelled: usize,
    /// Cancel or submit calls that failed, plus a failed positions read.
    pub failures: usize,
}

#[derive(Debug, Clone)]
pub enum FlattenOutcome {
    Completed(FlattenReport),
    /// Another caller is already flattening.
    AlreadyInProgress,
}

impl FlattenOutcome {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Cancel in-flight orders and close every open position at market.
///
/// Idempotent under concurrency: a second caller while a flatten runs gets
/// `AlreadyInProgress` and submits nothing.
pub async fn flatten_all(
    ledger: &OrderLedger,
    account: &dyn AccountSource,
    venue: &dyn ExecutionVenue,
    venue_name: &str,
    reason: ReasonCode,
) -> FlattenOutcome {
    let Some((_guard, superseded)) = ledger.begin_flatten() else {
        info!(reason = reason.as_str(), "Flatten already in progress");
        return FlattenOutcome::AlreadyInProgress;
    };
    Metrics::flatten(reason.as_str());
    warn!(reason = reason.as_str(), "FLATTEN ALL");

    let mut report = FlattenReport::default();

    for entry in superseded {
        let cloid = entry.order.cloid.clone();
        match venue.cancel(cloid.clone()).await {
            Ok(()) => report.cancelled += 1,
            Err(e) => {
                report.failures += 1;
                warn!(%cloid, error = %e, "Cancel of superseded order failed");
            }
        }
    }

    let positions = match account.positions().await {
        Ok(positions) => positions,
        Err(e) => {
            report.failures += 1;
            Metrics::degraded_event("flatten_positions");
            error!(error = %e, "Flatten could not read positions");
            return FlattenOutcome::Completed(report);
        }
    };

    for position in positions.into_iter().filter(|p| !p.is_flat()) {
        let side = if position.qty.is_negative() {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let order = OrderRequest::market(
            position.symbol.clone(),
            side,
            position.qty.abs(),
            venue_name,
            OrderPurpose::Flatten,
        );
        match venue.submit(order.clone()).await {
            Ok(_) => {
                Metrics::order_sent(OrderPurpose::Flatten.as_str());
                info!(symbol = %order.symbol, %side, qty = %order.qty, "Flatten order sent");
                report.orders.push(order);
            }
            Err(e) => {
                report.failures += 1;
                error!(symbol = %order.symbol, error = %e, "Flatten order failed");
            }
        }
    }

    info!(
        reason = reason.as_str(),
        orders = report.orders.len(),
        cancelled = report.cancelled,
        failures = report.failures,
        "Flatten complete"
    );
    FlattenOutcome::Completed(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::{FixtureAccount, PaperVenue};
    use rust_decimal_macros::dec;
    use sentinel_core::{AccountState, CollaboratorError, Position, Price, Size, Symbol};

    fn account_with(positions: Vec<Position>) -> FixtureAccount {
        let account = FixtureAccount::new(AccountState::new(
            Price::new(dec!(100000)),
            Price::new(dec!(50000)),
            Price::new(dec!(10000)),
            Price::new(dec!(20000)),
            Price::new(dec!(200000)),
        ));
        account.set_positions(Ok(positions));
        account
    }

    fn position(symbol: &str, qty: rust_decimal::Decimal) -> Position {
        Position::new(Symbol::new(symbol), Size::new(qty), Price::new(dec!(10)))
    }

    #[tokio::test]
    async fn test_closes_every_open_position() {
        let ledger = OrderLedger::new();
        let account = account_with(vec![
            position("AAPL", dec!(100)),
            position("MSFT", dec!(-20)),
            position("JPM", dec!(0)),
        ]);
        let venue = PaperVenue::new();

        let outcome =
            flatten_all(&ledger, &account, &venue, "primary", ReasonCode::VarBreach).await;
        let FlattenOutcome::Completed(report) = outcome else {
            panic!("expected completed flatten");
        };
        assert_eq!(report.orders.len(), 2);
        assert_eq!(report.failures, 0);

        let sent = venue.orders();
        assert_eq!(sent[0].side, OrderSide::Sell);
        assert_eq!(sent[0].qty, Size::new(dec!(100)));
        assert_eq!(sent[1].side, OrderSide::Buy);
        assert_eq!(sent[1].qty, Size::new(dec!(20)));
        assert!(sent.iter().all(|o| o.purpose == OrderPurpose::Flatten));
        assert!(!ledger.is_flattening());
    }

    #[tokio::test]
    async fn test_cancels_superseded_orders() {
        let ledger = OrderLedger::new();
        let pending = OrderRequest::market(
            Symbol::new("AAPL"),
            OrderSide::Buy,
            Size::new(dec!(5)),
            "primary",
            OrderPurpose::Entry,
        );
        ledger.register(&pending);
        let venue = PaperVenue::new();

        let outcome = flatten_all(
            &ledger,
            &account_with(vec![]),
            &venue,
            "primary",
            ReasonCode::RegTBreach,
        )
        .await;
        let FlattenOutcome::Completed(report) = outcome else {
            panic!("expected completed flatten");
        };
        assert_eq!(report.cancelled, 1);
        assert_eq!(venue.cancels(), vec![pending.cloid]);
    }

    #[tokio::test]
    async fn test_second_concurrent_flatten_is_noop() {
        let ledger = OrderLedger::new();
        let _running = ledger.begin_flatten().unwrap();
        let venue = PaperVenue::new();

        let outcome = flatten_all(
            &ledger,
            &account_with(vec![position("AAPL", dec!(100))]),
            &venue,
            "primary",
            ReasonCode::VarBreach,
        )
        .await;
        assert!(matches!(outcome, FlattenOutcome::AlreadyInProgress));
        assert!(venue.orders().is_empty());
    }

    #[tokio::test]
    async fn test_positions_failure_is_reported() {
        let ledger = OrderLedger::new();
        let account = account_with(vec![]);
        account.set_positions(Err(CollaboratorError::Transient("timeout".to_string())));
        let venue = PaperVenue::new();

        let outcome =
            flatten_all(&ledger, &account, &venue, "primary", ReasonCode::VarBreach).await;
        let FlattenOutcome::Completed(report) = outcome else {
            panic!("expected completed flatten");
        };
        assert_eq!(report.failures, 1);
        assert!(!ledger.is_flattening());
    }
}
