//! Risk configuration sections.
//!
//! Fractions are plain decimals (0.02 = 2%).

use std::collections::HashMap;

use chrono::{Duration, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};

fn check_fraction(name: &str, value: Decimal) -> RiskResult<()> {
    if value <= Decimal::ZERO || value >= Decimal::ONE {
        return Err(RiskError::ConfigError(format!(
            "{name} ({value}) must be in (0, 1)"
        )));
    }
    Ok(())
}

// ============================================================================
// [risk]
// ============================================================================

/// Session and sizing limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Kill-switch trips when daily P&L falls below −max_daily_loss_pct.
    #[serde(default = "default_max_daily_loss_pct")]
    pub max_daily_loss_pct: Decimal,
    /// Notional limit as a fraction of NAV (reported, not enforced by sizing).
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: Decimal,
    /// Stop distance as a fraction of price.
    #[serde(default = "default_hard_stop_pct")]
    pub hard_stop_pct: Decimal,
    /// Sizing refuses when margin usage > 1 − margin_buffer_pct.
    #[serde(default = "default_margin_buffer_pct")]
    pub margin_buffer_pct: Decimal,
}

fn default_max_daily_loss_pct() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

fn default_max_position_pct() -> Decimal {
    Decimal::ONE
}

fn default_hard_stop_pct() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_margin_buffer_pct() -> Decimal {
    Decimal::new(2, 1) // 0.2
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_daily_loss_pct: default_max_daily_loss_pct(),
            max_position_pct: default_max_position_pct(),
            hard_stop_pct: default_hard_stop_pct(),
            margin_buffer_pct: default_margin_buffer_pct(),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> RiskResult<()> {
        check_fraction("risk.max_daily_loss_pct", self.max_daily_loss_pct)?;
        check_fraction("risk.hard_stop_pct", self.hard_stop_pct)?;
        check_fraction("risk.margin_buffer_pct", self.margin_buffer_pct)?;
        if self.max_position_pct <= Decimal::ZERO {
            return Err(RiskError::ConfigError(format!(
                "risk.max_position_pct ({}) must be positive",
                self.max_position_pct
            )));
        }
        Ok(())
    }
}

// ============================================================================
// [portfolio]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// Flatten when VAR exceeds this (USD).
    #[serde(default = "default_max_var_usd")]
    pub max_var_usd: Decimal,
    /// Number of most recent daily P&L observations used for σ.
    #[serde(default = "default_var_lookback_days")]
    pub var_lookback_days: usize,
    #[serde(default = "default_var_confidence")]
    pub var_confidence: f64,
    /// Symbol → sector. Unmapped symbols fall into "OTHER".
    #[serde(default)]
    pub sectors: HashMap<String, String>,
}

fn default_max_var_usd() -> Decimal {
    Decimal::from(5000)
}

fn default_var_lookback_days() -> usize {
    60
}

fn default_var_confidence() -> f64 {
    0.95
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            max_var_usd: default_max_var_usd(),
            var_lookback_days: default_var_lookback_days(),
            var_confidence: default_var_confidence(),
            sectors: HashMap::new(),
        }
    }
}

impl PortfolioConfig {
    pub fn validate(&self) -> RiskResult<()> {
        if !(self.var_confidence > 0.5 && self.var_confidence < 1.0) {
            return Err(RiskError::ConfigError(format!(
                "portfolio.var_confidence ({}) must be in (0.5, 1)",
                self.var_confidence
            )));
        }
        if self.var_lookback_days < 2 {
            return Err(RiskError::ConfigError(format!(
                "portfolio.var_lookback_days ({}) must be at least 2",
                self.var_lookback_days
            )));
        }
        if self.max_var_usd <= Decimal::ZERO {
            return Err(RiskError::ConfigError(format!(
                "portfolio.max_var_usd ({}) must be positive",
                self.max_var_usd
            )));
        }
        Ok(())
    }
}

// ============================================================================
// [reg_t]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegTConfig {
    /// Breach when SMA / equity is strictly below this ratio.
    #[serde(default = "default_min_sma_ratio")]
    pub min_sma_ratio: Decimal,
}

fn default_min_sma_ratio() -> Decimal {
    Decimal::new(1, 1) // 0.1
}

impl Default for RegTConfig {
    fn default() -> Self {
        Self {
            min_sma_ratio: default_min_sma_ratio(),
        }
    }
}

impl RegTConfig {
    pub fn validate(&self) -> RiskResult<()> {
        if self.min_sma_ratio.is_sign_negative() {
            return Err(RiskError::ConfigError(format!(
                "reg_t.min_sma_ratio ({}) must be non-negative",
                self.min_sma_ratio
            )));
        }
        Ok(())
    }
}

// ============================================================================
// [hedge]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeConfig {
    #[serde(default = "default_hedge_beta")]
    pub hedge_beta: Decimal,
    /// Broad-market proxy traded for hedges.
    #[serde(default = "default_hedge_instrument")]
    pub instrument: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_hedge_beta() -> Decimal {
    Decimal::ONE
}

fn default_hedge_instrument() -> String {
    "SPY".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            hedge_beta: default_hedge_beta(),
            instrument: default_hedge_instrument(),
            enabled: true,
        }
    }
}

// ============================================================================
// [macro_calendar]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroCalendarConfig {
    /// Calendar endpoint. When absent every day is treated as clear.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_calendar_timeout_s")]
    pub timeout_s: u64,
}

fn default_calendar_timeout_s() -> u64 {
    5
}

impl Default for MacroCalendarConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_s: default_calendar_timeout_s(),
        }
    }
}

impl MacroCalendarConfig {
    pub fn validate(&self) -> RiskResult<()> {
        if self.url.is_some() && self.timeout_s == 0 {
            return Err(RiskError::ConfigError(
                "macro_calendar.timeout_s must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// [session]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Daily session boundary in UTC, "HH:MM".
    #[serde(default = "default_reset_utc")]
    pub reset_utc: String,
    /// Market close in UTC, "HH:MM".
    #[serde(default = "default_market_close_utc")]
    pub market_close_utc: String,
    /// Flatten every position this many minutes before the close; 0 disables.
    #[serde(default = "default_flatten_before_close_min")]
    pub flatten_before_close_min: u32,
    /// Flatten every position when the process stops.
    #[serde(default = "default_flatten_on_shutdown")]
    pub flatten_on_shutdown: bool,
}

fn default_reset_utc() -> String {
    "13:30".to_string()
}

fn default_market_close_utc() -> String {
    "20:00".to_string()
}

fn default_flatten_before_close_min() -> u32 {
    5
}

fn default_flatten_on_shutdown() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reset_utc: default_reset_utc(),
            market_close_utc: default_market_close_utc(),
            flatten_before_close_min: default_flatten_before_close_min(),
            flatten_on_shutdown: default_flatten_on_shutdown(),
        }
    }
}

fn parse_hhmm(name: &str, value: &str) -> RiskResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| RiskError::ConfigError(format!("{name} ({value}) must be HH:MM: {e}")))
}

impl SessionConfig {
    /// Parsed session boundary.
    pub fn reset_time(&self) -> RiskResult<NaiveTime> {
        parse_hhmm("session.reset_utc", &self.reset_utc)
    }

    /// Daily pre-close flatten time, `None` when disabled.
    pub fn preclose_flatten_time(&self) -> RiskResult<Option<NaiveTime>> {
        let close = parse_hhmm("session.market_close_utc", &self.market_close_utc)?;
        if self.flatten_before_close_min == 0 {
            return Ok(None);
        }
        if self.flatten_before_close_min >= 24 * 60 {
            return Err(RiskError::ConfigError(format!(
                "session.flatten_before_close_min ({}) must be under one day",
                self.flatten_before_close_min
            )));
        }
        Ok(Some(
            close - Duration::minutes(i64::from(self.flatten_before_close_min)),
        ))
    }

    pub fn validate(&self) -> RiskResult<()> {
        self.reset_time()?;
        self.preclose_flatten_time()?;
        Ok(())
    }
}
