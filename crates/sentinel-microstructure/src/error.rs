//! Microstructure error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MicrostructureError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Fill learner stopped")]
    LearnerClosed,
}

pub type MicrostructureResult<T> = Result<T, MicrostructureError>;
