//! Sentinel execution gate application.
//!
//! Wires the decision pipeline to paper collaborators, reads trading
//! signals as JSON lines, resets the trading session once per UTC day,
//! flattens before the close and on shutdown, and serves Prometheus metrics.

pub mod app;
pub mod close_flatten;
pub mod config;
pub mod error;
pub mod metrics_server;
pub mod session_reset;

pub use app::{Application, RunSummary};
pub use config::{AppConfig, PaperConfig, TelemetryConfig};
pub use error::{AppError, AppResult};
