//! Executor configuration.

use std::path::PathBuf;
use std::time::Duration;

use sentinel_microstructure::{ImpactConfig, MicroConfig, RouterConfig};
use sentinel_risk::{HedgeConfig, PortfolioConfig, RegTConfig, RiskConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ExecutorError, ExecutorResult};

// ============================================================================
// [book]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookConfig {
    /// Levels kept per side.
    #[serde(default = "default_book_depth")]
    pub book_depth: usize,
    /// Absolute deadline for the one-shot book fetch.
    #[serde(default = "default_book_fetch_timeout_s")]
    pub book_fetch_timeout_s: u64,
}

fn default_book_depth() -> usize {
    5
}

fn default_book_fetch_timeout_s() -> u64 {
    5
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            book_depth: default_book_depth(),
            book_fetch_timeout_s: default_book_fetch_timeout_s(),
        }
    }
}

impl BookConfig {
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.book_fetch_timeout_s)
    }

    pub fn validate(&self) -> ExecutorResult<()> {
        if self.book_depth == 0 {
            return Err(ExecutorError::ConfigError(
                "book.book_depth must be at least 1".to_string(),
            ));
        }
        if self.book_fetch_timeout_s == 0 {
            return Err(ExecutorError::ConfigError(
                "book.book_fetch_timeout_s must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// [audit]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_audit_data_dir")]
    pub data_dir: PathBuf,
    /// Oldest records are dropped beyond this many pending.
    #[serde(default = "default_audit_queue_capacity")]
    pub queue_capacity: usize,
    /// Records buffered before a write to disk.
    #[serde(default = "default_audit_flush_every")]
    pub flush_every: usize,
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_data_dir() -> PathBuf {
    PathBuf::from("data/audit")
}

fn default_audit_queue_capacity() -> usize {
    1024
}

fn default_audit_flush_every() -> usize {
    16
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            data_dir: default_audit_data_dir(),
            queue_capacity: default_audit_queue_capacity(),
            flush_every: default_audit_flush_every(),
        }
    }
}

impl AuditConfig {
    pub fn validate(&self) -> ExecutorResult<()> {
        if self.enabled && self.queue_capacity == 0 {
            return Err(ExecutorError::ConfigError(
                "audit.queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Thresholds and model parameters for one decision pipeline.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    pub risk: RiskConfig,
    pub impact: ImpactConfig,
    pub micro: MicroConfig,
    pub router: RouterConfig,
    pub portfolio: PortfolioConfig,
    pub reg_t: RegTConfig,
    pub hedge: HedgeConfig,
    pub book: BookConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let book = BookConfig::default();
        assert_eq!(book.book_depth, 5);
        assert_eq!(book.fetch_timeout(), Duration::from_secs(5));
        book.validate().unwrap();

        let audit = AuditConfig::default();
        assert_eq!(audit.queue_capacity, 1024);
        audit.validate().unwrap();
    }

    #[test]
    fn test_zero_depth_rejected() {
        let book = BookConfig {
            book_depth: 0,
            ..Default::default()
        };
        assert!(book.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let book: BookConfig = serde_json::from_str(r#"{"book_depth": 10}"#).unwrap();
        assert_eq!(book.book_depth, 10);
        assert_eq!(book.book_fetch_timeout_s, 5);
    }
}
