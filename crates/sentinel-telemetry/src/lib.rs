//! Prometheus metrics and structured logging for the sentinel execution gate.
//!
//! - Counters and gauges for risk trips, degraded events and decisions
//! - Text exposition for the `/metrics` endpoint
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{encode_text, Metrics};
