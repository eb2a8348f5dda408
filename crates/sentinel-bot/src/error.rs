//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Risk error: {0}")]
    Risk(#[from] sentinel_risk::RiskError),

    #[error("Microstructure error: {0}")]
    Microstructure(#[from] sentinel_microstructure::MicrostructureError),

    #[error("Executor error: {0}")]
    Executor(#[from] sentinel_executor::ExecutorError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] sentinel_telemetry::TelemetryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] sentinel_persistence::PersistenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
