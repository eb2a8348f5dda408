//! Risk error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

pub type RiskResult<T> = Result<T, RiskError>;
