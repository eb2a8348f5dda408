//! Microstructure model configuration.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{MicrostructureError, MicrostructureResult};

/// `[impact]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactConfig {
    /// Skip when estimated slippage exceeds this many bps.
    #[serde(default = "default_max_slippage_bps")]
    pub max_slippage_bps: Decimal,
    /// Temporary impact coefficient (auxiliary output only).
    #[serde(default = "default_impact_gamma")]
    pub impact_gamma: Decimal,
    /// Permanent impact coefficient (auxiliary output only).
    #[serde(default = "default_impact_eta")]
    pub impact_eta: Decimal,
}

fn default_max_slippage_bps() -> Decimal {
    Decimal::from(10)
}

fn default_impact_gamma() -> Decimal {
    Decimal::new(5, 1) // 0.5
}

fn default_impact_eta() -> Decimal {
    Decimal::new(1, 1) // 0.1
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            max_slippage_bps: default_max_slippage_bps(),
            impact_gamma: default_impact_gamma(),
            impact_eta: default_impact_eta(),
        }
    }
}

/// `[micro]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroConfig {
    /// Cost in bps per unit of absolute book imbalance.
    #[serde(default = "default_adverse_alpha")]
    pub adverse_alpha: Decimal,
    /// Skip when adverse-selection cost exceeds this many bps.
    #[serde(default = "default_max_cost_bps")]
    pub max_cost_bps: Decimal,
}

fn default_adverse_alpha() -> Decimal {
    Decimal::from(5)
}

fn default_max_cost_bps() -> Decimal {
    Decimal::from(3)
}

impl ImpactConfig {
    pub fn validate(&self) -> MicrostructureResult<()> {
        for (name, value) in [
            ("max_slippage_bps", self.max_slippage_bps),
            ("impact_gamma", self.impact_gamma),
            ("impact_eta", self.impact_eta),
        ] {
            if value.is_sign_negative() {
                return Err(MicrostructureError::ConfigError(format!(
                    "impact.{name} ({value}) must not be negative"
                )));
            }
        }
        Ok(())
    }
}

impl Default for MicroConfig {
    fn default() -> Self {
        Self {
            adverse_alpha: default_adverse_alpha(),
            max_cost_bps: default_max_cost_bps(),
        }
    }
}

impl MicroConfig {
    pub fn validate(&self) -> MicrostructureResult<()> {
        if self.adverse_alpha.is_sign_negative() || self.max_cost_bps.is_sign_negative() {
            return Err(MicrostructureError::ConfigError(format!(
                "micro.adverse_alpha ({}) and micro.max_cost_bps ({}) must not be negative",
                self.adverse_alpha, self.max_cost_bps
            )));
        }
        Ok(())
    }
}

/// `[router]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_venue")]
    pub default_venue: String,
    /// Fee applied to venues missing from `venue_fees`.
    #[serde(default = "default_fee_bps")]
    pub default_fee_bps: Decimal,
    /// Per-venue fee in bps.
    #[serde(default)]
    pub venue_fees: HashMap<String, Decimal>,
}

fn default_venue() -> String {
    "primary".to_string()
}

fn default_fee_bps() -> Decimal {
    Decimal::new(3, 1) // 0.3
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_venue: default_venue(),
            default_fee_bps: default_fee_bps(),
            venue_fees: HashMap::new(),
        }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> MicrostructureResult<()> {
        if self.default_venue.is_empty() {
            return Err(MicrostructureError::ConfigError(
                "router.default_venue must not be empty".to_string(),
            ));
        }
        if let Some((venue, fee)) = std::iter::once((&self.default_venue, &self.default_fee_bps))
            .chain(self.venue_fees.iter())
            .find(|(_, fee)| fee.is_sign_negative())
        {
            return Err(MicrostructureError::ConfigError(format!(
                "router fee for {venue} ({fee}) must not be negative"
            )));
        }
        Ok(())
    }
}

/// `[fill_model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillModelConfig {
    /// Samples accumulated per symbol before a fit.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Gradient-descent passes per fit.
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// Sample channel capacity.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_batch_size() -> usize {
    1000
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_epochs() -> usize {
    200
}

fn default_channel_capacity() -> usize {
    4096
}

impl Default for FillModelConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            epochs: default_epochs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl FillModelConfig {
    pub fn validate(&self) -> MicrostructureResult<()> {
        if self.batch_size == 0 {
            return Err(MicrostructureError::ConfigError(
                "fill_model.batch_size must be positive".to_string(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(MicrostructureError::ConfigError(format!(
                "fill_model.learning_rate ({}) must be positive",
                self.learning_rate
            )));
        }
        if self.channel_capacity == 0 {
            return Err(MicrostructureError::ConfigError(
                "fill_model.channel_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
