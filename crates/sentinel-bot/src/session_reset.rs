//! Daily trading-session reset task.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use sentinel_risk::{InMemoryReturnHistory, SessionResetSchedule, SessionRiskState};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Wall-clock wait until `next`, zero when it has passed.
#[must_use]
pub fn delay_until(next: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Dollar P&L of the session so far; `None` before a baseline exists.
#[must_use]
pub fn session_pnl_usd(session: &SessionRiskState) -> Option<f64> {
    let start = session.start_nav()?;
    (start.inner() * session.daily_pnl_pct()).to_f64()
}

/// Reset `session` at every schedule boundary, first appending the closing
/// session's dollar P&L to `history`.
///
/// The session start time marks the last reset, so an early wake-up or a
/// process start after today's boundary never resets twice.
pub fn spawn_session_reset(
    session: Arc<SessionRiskState>,
    schedule: SessionResetSchedule,
    history: Arc<InMemoryReturnHistory>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(reset_at = %schedule.reset_at(), "Session reset task started");
        loop {
            let now = Utc::now();
            let next = schedule.next_boundary(now);
            debug!(%next, "Next session reset");
            tokio::time::sleep(delay_until(next, now)).await;

            let now = Utc::now();
            if schedule.is_due(session.started_at(), now) {
                info!(
                    daily_pnl_pct = %session.daily_pnl_pct(),
                    tripped = session.is_tripped(),
                    "Session boundary reached, resetting"
                );
                if let Some(pnl) = session_pnl_usd(&session) {
                    history.record(pnl);
                }
                session.reset();
            }
        }
    })
}
