//! Trading signal received from the signal provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::order::{OrderAction, Symbol};
use crate::Price;

/// Opaque trade proposal. The provider's model is not part of this system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub symbol: Symbol,
    pub action: OrderAction,
    /// Provider confidence in [0, 1]. Logged, not used for gating.
    #[serde(default)]
    pub confidence: f64,
    /// Overrides the sizer's stop level when present.
    #[serde(default)]
    pub stop: Option<Price>,
    /// Overrides the sizer's take-profit level when present.
    #[serde(default)]
    pub take: Option<Price>,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
}

impl TradingSignal {
    #[must_use]
    pub fn new(symbol: impl Into<Symbol>, action: OrderAction, confidence: f64) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            confidence,
            stop: None,
            take: None,
            generated_at: None,
        }
    }

    #[must_use]
    pub fn with_levels(mut self, stop: Option<Price>, take: Option<Price>) -> Self {
        self.stop = stop;
        self.take = take;
        self
    }
}
