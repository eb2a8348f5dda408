//! Daily flatten ahead of the market close.

use std::sync::Arc;

use chrono::Utc;
use sentinel_core::ReasonCode;
use sentinel_executor::{ExecutionCoordinator, FlattenOutcome};
use sentinel_risk::SessionResetSchedule;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::session_reset::delay_until;

/// Flatten every position at each `schedule` boundary.
pub fn spawn_close_flatten(
    coordinator: Arc<ExecutionCoordinator>,
    schedule: SessionResetSchedule,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(flatten_at = %schedule.reset_at(), "Pre-close flatten task started");
        let mut after = Utc::now();
        loop {
            let next = schedule.next_boundary(after);
            debug!(%next, "Next pre-close flatten");
            tokio::time::sleep(delay_until(next, Utc::now())).await;
            after = next;

            warn!("Market close approaching, flattening");
            match coordinator.flatten_all(ReasonCode::SessionClose).await {
                FlattenOutcome::Completed(report) if report.failures > 0 => {
                    error!(failures = report.failures, "Pre-close flatten completed with failures");
                }
                FlattenOutcome::Completed(_) | FlattenOutcome::AlreadyInProgress => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sentinel_core::{AccountState, OrderPurpose, OrderSide, Position, Price, Size, Symbol};
    use sentinel_executor::{CoordinatorConfig, FixtureAccount, FixtureMarketData, PaperVenue};
    use sentinel_risk::{InMemoryReturnHistory, RiskGate, SessionRiskState};
    use std::time::Duration;

    #[tokio::test]
    async fn test_flattens_at_boundary() {
        let account = FixtureAccount::new(AccountState::new(
            Price::new(dec!(100000)),
            Price::new(dec!(90000)),
            Price::new(dec!(10000)),
            Price::new(dec!(30000)),
            Price::new(dec!(200000)),
        ));
        account.set_positions(Ok(vec![Position::new(
            Symbol::new("AAPL"),
            Size::new(dec!(-40)),
            Price::new(dec!(50)),
        )]));
        let venue = Arc::new(PaperVenue::new());
        let coordinator = Arc::new(ExecutionCoordinator::new(
            &CoordinatorConfig::default(),
            RiskGate::new(Arc::new(SessionRiskState::new(dec!(0.02))), None),
            Arc::new(InMemoryReturnHistory::new(10)),
            Arc::new(FixtureMarketData::new()),
            Arc::new(account),
            venue.clone(),
        ));

        let at = (Utc::now() + chrono::Duration::milliseconds(200)).time();
        let handle = spawn_close_flatten(coordinator, SessionResetSchedule::new(at));

        for _ in 0..100 {
            if !venue.orders().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();

        let orders = venue.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].purpose, OrderPurpose::Flatten);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].qty, Size::new(dec!(40)));
    }
}
