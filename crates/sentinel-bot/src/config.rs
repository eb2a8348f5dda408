//! Application configuration.

use crate::error::{AppError, AppResult};
use sentinel_executor::{AuditConfig, BookConfig, CoordinatorConfig};
use sentinel_microstructure::{FillModelConfig, ImpactConfig, MicroConfig, RouterConfig};
use sentinel_risk::{
    HedgeConfig, MacroCalendarConfig, PortfolioConfig, RegTConfig, RiskConfig, SessionConfig,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub impact: ImpactConfig,
    #[serde(default)]
    pub micro: MicroConfig,
    #[serde(default)]
    pub portfolio: PortfolioConfig,
    #[serde(default)]
    pub reg_t: RegTConfig,
    #[serde(default)]
    pub hedge: HedgeConfig,
    #[serde(default)]
    pub book: BookConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub macro_calendar: MacroCalendarConfig,
    #[serde(default)]
    pub fill_model: FillModelConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub paper: PaperConfig,
}

impl AppConfig {
    /// Load from `SENTINEL_CONFIG` or `config/default.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> AppResult<Self> {
        let config_path = std::env::var("SENTINEL_CONFIG")
            .unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Reject out-of-range values in every section.
    pub fn validate(&self) -> AppResult<()> {
        self.risk.validate()?;
        self.impact.validate()?;
        self.micro.validate()?;
        self.portfolio.validate()?;
        self.reg_t.validate()?;
        self.router.validate()?;
        self.macro_calendar.validate()?;
        self.fill_model.validate()?;
        self.session.validate()?;
        self.book.validate()?;
        self.audit.validate()?;
        self.paper.validate()?;
        Ok(())
    }

    /// Sections consumed by the decision pipeline.
    #[must_use]
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            risk: self.risk.clone(),
            impact: self.impact.clone(),
            micro: self.micro.clone(),
            router: self.router.clone(),
            portfolio: self.portfolio.clone(),
            reg_t: self.reg_t.clone(),
            hedge: self.hedge.clone(),
            book: self.book.clone(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus metrics port.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
            log_level: default_log_level(),
        }
    }
}

/// `[paper]` section: deterministic collaborators for paper trading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// JSON fixture with account, positions, prices, books and P&L history.
    #[serde(default = "default_fixture")]
    pub fixture: PathBuf,
    /// Daily P&L samples kept for VAR.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Whether paper acknowledgments report a full fill.
    #[serde(default = "default_report_fills")]
    pub report_fills: bool,
}

fn default_fixture() -> PathBuf {
    PathBuf::from("config/paper_fixture.json")
}

fn default_history_capacity() -> usize {
    252
}

fn default_report_fills() -> bool {
    true
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            fixture: default_fixture(),
            history_capacity: default_history_capacity(),
            report_fills: default_report_fills(),
        }
    }
}

impl PaperConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.history_capacity < 2 {
            return Err(AppError::Config(format!(
                "paper.history_capacity ({}) must be at least 2",
                self.history_capacity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.telemetry.metrics_port, 9090);
        assert_eq!(config.session.reset_utc, "13:30");
        assert!(config.macro_calendar.url.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [risk]
            max_daily_loss_pct = "0.03"

            [portfolio]
            max_var_usd = "2500"

            [portfolio.sectors]
            AAPL = "TECH"
            JPM = "FIN"

            [router.venue_fees]
            ARCA = "0.2"
            "#,
        )
        .unwrap();

        assert_eq!(config.risk.max_daily_loss_pct, dec!(0.03));
        assert_eq!(config.risk.hard_stop_pct, dec!(0.01));
        assert_eq!(config.portfolio.max_var_usd, dec!(2500));
        assert_eq!(config.portfolio.var_lookback_days, 60);
        assert_eq!(config.portfolio.sectors.get("JPM").map(String::as_str), Some("FIN"));
        assert_eq!(config.router.venue_fees.get("ARCA"), Some(&dec!(0.2)));
        assert_eq!(config.book.book_depth, 5);
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_section_rejected() {
        let config: AppConfig = toml::from_str(
            r#"
            [session]
            reset_utc = "25:99"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config: AppConfig = toml::from_str(
            r#"
            [session]
            market_close_utc = "close"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config: AppConfig = toml::from_str(
            r#"
            [portfolio]
            var_confidence = 0.4
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_coordinator_config_carries_sections() {
        let mut config = AppConfig::default();
        config.hedge.hedge_beta = dec!(1.2);
        config.book.book_depth = 10;

        let coordinator = config.coordinator_config();
        assert_eq!(coordinator.hedge.hedge_beta, dec!(1.2));
        assert_eq!(coordinator.book.book_depth, 10);
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = toml::to_string(&AppConfig::default()).unwrap();
        assert!(toml_str.contains("max_daily_loss_pct"));
        assert!(toml_str.contains("metrics_port"));
    }

    #[test]
    fn test_from_file_missing_is_config_error() {
        let err = AppConfig::from_file("does/not/exist.toml").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
