//! Append-only audit trail persistence.
//!
//! Decision records are written as JSON Lines, one file per UTC day, in
//! append mode so that restarts never truncate earlier records.

pub mod error;
pub mod writer;

pub use error::{PersistenceError, PersistenceResult};
pub use writer::JsonLinesWriter;
