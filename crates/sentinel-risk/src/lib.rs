//! Risk controls for the sentinel execution gate.
//!
//! Session-level admission and the per-cycle risk models:
//! - `SessionRiskState` / `RiskGate`: daily-loss kill-switch and macro-event gate
//! - `PositionSizer`: margin-buffered sizing with stop/take levels
//! - `PortfolioRiskMonitor`: net exposure, sector deltas and parametric VAR
//! - `RegTMonitor`: SMA-to-equity buffer
//! - `HedgeCalculator`: beta hedge against a broad-market proxy
//! - `SessionResetSchedule`: daily session boundary

pub mod config;
pub mod error;
pub mod hedge;
pub mod macro_calendar;
pub mod portfolio;
pub mod reg_t;
pub mod schedule;
pub mod session;
pub mod sizer;

pub use config::{
    HedgeConfig, MacroCalendarConfig, PortfolioConfig, RegTConfig, RiskConfig, SessionConfig,
};
pub use error::{RiskError, RiskResult};
pub use hedge::{HedgeCalculator, HedgeInstruction};
pub use macro_calendar::{FixedMacroCalendar, HttpMacroCalendar, MacroCalendar};
pub use portfolio::{
    InMemoryReturnHistory, PortfolioRiskMonitor, ReturnHistory, RiskSnapshot, RiskStatus,
    OTHER_SECTOR,
};
pub use reg_t::{RegTMonitor, RegTSnapshot};
pub use schedule::SessionResetSchedule;
pub use session::{RiskGate, SessionRiskState};
pub use sizer::{PositionSizer, SizedOrder};
