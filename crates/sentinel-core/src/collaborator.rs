//! Shared shapes for calls that cross a collaborator boundary.
//!
//! Every external call (book fetch, account read, calendar fetch, order
//! submission) returns `Result<T, CollaboratorError>`. Callers match on the
//! classification and apply their own fallback; nothing is swallowed into a
//! default value.

use std::pin::Pin;

use thiserror::Error;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Classified failure of an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// Timeout, disconnect, 5xx: may succeed on a later cycle.
    #[error("transient: {0}")]
    Transient(String),
    /// Malformed response, authentication, 4xx: will not heal by itself.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl CollaboratorError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Metric label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transient(_) => "transient",
            Self::Fatal(_) => "fatal",
        }
    }
}

/// Result of a collaborator call.
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;
