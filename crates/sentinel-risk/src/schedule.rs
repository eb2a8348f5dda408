//! Daily session boundary.

use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::config::SessionConfig;
use crate::error::RiskResult;

/// Fires once per UTC day at `reset_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionResetSchedule {
    reset_at: NaiveTime,
}

impl SessionResetSchedule {
    #[must_use]
    pub fn new(reset_at: NaiveTime) -> Self {
        Self { reset_at }
    }

    pub fn from_config(config: &SessionConfig) -> RiskResult<Self> {
        Ok(Self::new(config.reset_time()?))
    }

    #[must_use]
    pub fn reset_at(&self) -> NaiveTime {
        self.reset_at
    }

    /// Most recent boundary at or before `now`.
    #[must_use]
    pub fn last_boundary(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.reset_at).and_utc();
        if today <= now {
            today
        } else {
            today - Duration::days(1)
        }
    }

    /// First boundary strictly after `now`.
    #[must_use]
    pub fn next_boundary(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.last_boundary(now) + Duration::days(1)
    }

    /// Whether a boundary has passed since `last_reset`.
    #[must_use]
    pub fn is_due(&self, last_reset: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.last_boundary(now) > last_reset
    }
}
