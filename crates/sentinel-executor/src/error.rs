//! Executor error types.

use sentinel_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Fixture error: {0}")]
    Fixture(String),

    #[error("Audit persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
