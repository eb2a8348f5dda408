//! Signal-to-order decision pipeline.
//!
//! # Key Components
//!
//! - [`ExecutionCoordinator`]: Ordered gating, sizing, scoring, routing and submission per signal
//! - [`FillTracker`]: Entry fill outcomes for the fill-probability learner
//! - [`OrderLedger`]: In-flight order tracking; flatten supersedes unacknowledged orders
//! - [`flatten_all`]: Idempotent forced exit of every open position
//! - [`AuditQueue`]: Bounded drop-oldest queue feeding the JSON Lines audit writer
//! - [`MarketData`], [`AccountSource`], [`ExecutionVenue`]: Collaborator boundaries
//! - [`paper`]: Deterministic collaborators for paper trading and tests

pub mod audit;
pub mod collaborator;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fills;
pub mod flatten;
pub mod ledger;
pub mod paper;

pub use audit::{spawn_audit_writer, AuditQueue, AuditRecord};
pub use collaborator::{
    AccountSource, ExecutionVenue, FillEvent, FillReport, MarketData, VenueAck,
};
pub use config::{AuditConfig, BookConfig, CoordinatorConfig};
pub use coordinator::ExecutionCoordinator;
pub use error::{ExecutorError, ExecutorResult};
pub use fills::{spawn_fill_listener, FillTracker};
pub use flatten::{flatten_all, FlattenOutcome, FlattenReport};
pub use ledger::{AckDisposition, FlattenGuard, InFlightOrder, OrderLedger};
pub use paper::{fixture_book, FixtureAccount, FixtureMarketData, PaperFixture, PaperVenue};
