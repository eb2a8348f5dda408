//! Session-scoped kill-switch and admission gate.
//!
//! `SessionRiskState` holds the session-start NAV, the latest daily P&L and the
//! kill-switch. The baseline is captured lazily on the first valid NAV. Once the
//! kill-switch trips it stays tripped for the rest of the session, whatever NAV
//! does afterwards; only an explicit [`SessionRiskState::reset`] clears it.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sentinel_core::{AccountState, Price};
use sentinel_telemetry::Metrics;
use tracing::{debug, error, info, warn};

use crate::macro_calendar::MacroCalendar;

// ============================================================================
// SessionRiskState
// ============================================================================

#[derive(Debug)]
struct SessionInner {
    start_nav: Option<Price>,
    daily_pnl_pct: Decimal,
    tripped_at: Option<DateTime<Utc>>,
    started_at: DateTime<Utc>,
}

impl SessionInner {
    fn fresh() -> Self {
        Self {
            start_nav: None,
            daily_pnl_pct: Decimal::ZERO,
            tripped_at: None,
            started_at: Utc::now(),
        }
    }
}

/// Shared per-account session state.
///
/// Thread-safe: share via `Arc<SessionRiskState>`. Baseline capture, P&L update
/// and the trip decision happen under one lock, so concurrent admissions for
/// different instruments see a single consistent session.
#[derive(Debug)]
pub struct SessionRiskState {
    max_daily_loss_pct: Decimal,
    inner: Mutex<SessionInner>,
}

impl SessionRiskState {
    #[must_use]
    pub fn new(max_daily_loss_pct: Decimal) -> Self {
        Self {
            max_daily_loss_pct,
            inner: Mutex::new(SessionInner::fresh()),
        }
    }

    /// Update daily P&L from `nav` and decide admission.
    ///
    /// - No baseline yet: a positive `nav` becomes the baseline, P&L is 0.
    /// - Otherwise P&L = (nav − start) / start.
    /// - P&L < −max_daily_loss trips the kill-switch.
    ///
    /// Returns false whenever the kill-switch is tripped.
    pub fn admit(&self, nav: Price) -> bool {
        let mut inner = self.inner.lock();

        match inner.start_nav {
            None => {
                if nav.is_positive() {
                    inner.start_nav = Some(nav);
                    info!(start_nav = %nav, "Session baseline NAV captured");
                }
                inner.daily_pnl_pct = Decimal::ZERO;
            }
            Some(start) if start.is_positive() => {
                inner.daily_pnl_pct = (nav.inner() - start.inner()) / start.inner();
            }
            Some(_) => inner.daily_pnl_pct = Decimal::ZERO,
        }
        let pnl = inner.daily_pnl_pct;
        Metrics::daily_pnl_pct(pnl.to_f64().unwrap_or(0.0));

        if inner.tripped_at.is_some() {
            debug!(%nav, daily_pnl_pct = %pnl, "Kill-switch active, admission denied");
            return false;
        }

        if pnl < -self.max_daily_loss_pct {
            inner.tripped_at = Some(Utc::now());
            Metrics::kill_switch_tripped();
            error!(
                %nav,
                daily_pnl_pct = %pnl,
                max_daily_loss_pct = %self.max_daily_loss_pct,
                "KILL SWITCH TRIPPED"
            );
            return false;
        }
        true
    }

    /// Latest daily P&L fraction (0 before the first admission).
    #[must_use]
    pub fn daily_pnl_pct(&self) -> Decimal {
        self.inner.lock().daily_pnl_pct
    }

    #[must_use]
    pub fn start_nav(&self) -> Option<Price> {
        self.inner.lock().start_nav
    }

    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.inner.lock().tripped_at.is_some()
    }

    #[must_use]
    pub fn tripped_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().tripped_at
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.lock().started_at
    }

    /// Start a new session: clear baseline, P&L and kill-switch.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        info!(
            previous_start_nav = ?inner.start_nav,
            previous_pnl_pct = %inner.daily_pnl_pct,
            was_tripped = inner.tripped_at.is_some(),
            "Session risk state reset"
        );
        *inner = SessionInner::fresh();
        Metrics::daily_pnl_pct(0.0);
    }
}

// ============================================================================
// RiskGate
// ============================================================================

/// Admission control: kill-switch plus macro-event calendar.
pub struct RiskGate {
    session: Arc<SessionRiskState>,
    calendar: Option<Arc<dyn MacroCalendar>>,
}

impl RiskGate {
    /// `calendar = None` treats every day as clear.
    #[must_use]
    pub fn new(session: Arc<SessionRiskState>, calendar: Option<Arc<dyn MacroCalendar>>) -> Self {
        Self { session, calendar }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionRiskState> {
        &self.session
    }

    /// Kill-switch admission for `nav`.
    pub fn admit(&self, nav: Price) -> bool {
        self.session.admit(nav)
    }

    /// Admission for an account read. An invalid account never touches the
    /// baseline; it is admitted only if the kill-switch is not tripped.
    pub fn admit_account(&self, account: &AccountState) -> bool {
        if account.is_valid() {
            self.admit(account.nav)
        } else {
            warn!("Account unavailable, admission checks kill-switch only");
            !self.session.is_tripped()
        }
    }

    /// False only when the calendar reports a high-impact event on `date`.
    ///
    /// Fetch failures fail OPEN: logged, counted, and treated as clear.
    pub async fn macro_clear(&self, date: NaiveDate) -> bool {
        let Some(calendar) = &self.calendar else {
            return true;
        };
        match calendar.high_impact_on(date).await {
            Ok(false) => true,
            Ok(true) => {
                info!(%date, "High-impact macro event scheduled");
                false
            }
            Err(e) => {
                Metrics::macro_fetch_failed(e.kind());
                Metrics::degraded_event("macro_calendar");
                if e.is_transient() {
                    warn!(%date, error = %e, "Macro calendar unavailable, failing open");
                } else {
                    error!(%date, error = %e, "Macro calendar failed, failing open");
                }
                true
            }
        }
    }
}
