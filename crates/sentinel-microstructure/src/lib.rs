//! Order book microstructure models for the execution gate.
//!
//! Every model scores a candidate order against one `OrderBookSnapshot`:
//! - `ImpactEstimator`: book walk for expected fill price and slippage
//! - `MicroPriceEngine`: adverse-selection cost from book imbalance
//! - `SmartRouter`: passive vs. aggressive style and venue fee
//! - `FillModel`: online fill-probability learner (single-writer actor)

pub mod config;
pub mod error;
pub mod fill_model;
pub mod impact;
pub mod micro_price;
pub mod router;

pub use config::{FillModelConfig, ImpactConfig, MicroConfig, RouterConfig};
pub use error::{MicrostructureError, MicrostructureResult};
pub use fill_model::{
    spawn_fill_learner, FillFeatures, FillLearnerHandle, FillModel, FillSample,
    COLD_START_PROBABILITY,
};
pub use impact::{ImpactEstimate, ImpactEstimator};
pub use micro_price::{MicroPriceEngine, MicroPriceResult};
pub use router::{Route, RouteStyle, SmartRouter};
