//! Fill labelling for the fill-probability learner.
//!
//! Entry orders are tracked from submission until they fill completely or the
//! venue reports them done. Every report that raises the cumulative fill
//! becomes one sample, labelled filled only once the whole order quantity has
//! executed. A done report for an order that never filled is one negative
//! sample.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sentinel_core::{ClientOrderId, OrderRequest, Size, Symbol};
use sentinel_microstructure::{FillFeatures, FillLearnerHandle, FillSample};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::collaborator::FillEvent;

#[derive(Debug)]
struct PendingFill {
    symbol: Symbol,
    order_qty: Size,
    features: FillFeatures,
    filled_qty: Size,
    labelled: bool,
}

/// Entry orders awaiting their fill outcome.
pub struct FillTracker {
    learner: FillLearnerHandle,
    pending: Mutex<HashMap<ClientOrderId, PendingFill>>,
}

impl FillTracker {
    #[must_use]
    pub fn new(learner: FillLearnerHandle) -> Self {
        Self {
            learner,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Start tracking `order`. Call before submission so no fill is missed.
    pub fn track(&self, order: &OrderRequest, features: FillFeatures) {
        self.pending.lock().insert(
            order.cloid.clone(),
            PendingFill {
                symbol: order.symbol.clone(),
                order_qty: order.qty,
                features,
                filled_qty: Size::ZERO,
                labelled: false,
            },
        );
    }

    /// Stop tracking an order that never reached the venue.
    pub fn forget(&self, cloid: &ClientOrderId) {
        self.pending.lock().remove(cloid);
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Apply a cumulative fill for `cloid`.
    pub fn on_fill(&self, cloid: &ClientOrderId, filled_qty: Size, done: bool) {
        let sample = {
            let mut pending = self.pending.lock();
            let Some(entry) = pending.get_mut(cloid) else {
                debug!(%cloid, "Fill for untracked order");
                return;
            };

            let increased = filled_qty > entry.filled_qty;
            if increased {
                entry.filled_qty = filled_qty;
            }
            let complete = entry.filled_qty >= entry.order_qty;
            let sample = (increased || (done && !entry.labelled)).then(|| FillSample {
                symbol: entry.symbol.clone(),
                features: entry.features,
                filled: complete,
            });
            if sample.is_some() {
                entry.labelled = true;
            }
            if complete || done {
                pending.remove(cloid);
            }
            sample
        };

        if let Some(sample) = sample {
            debug!(%cloid, %filled_qty, filled = sample.filled, "Fill outcome recorded");
            self.learner.record(sample);
        }
    }

    pub fn on_event(&self, event: &FillEvent) {
        self.on_fill(&event.cloid, event.filled_qty, event.done);
    }
}

/// Feed venue fill events to `tracker` until the venue closes the stream.
pub fn spawn_fill_listener(
    tracker: Arc<FillTracker>,
    mut fills: broadcast::Receiver<FillEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Fill listener started");
        loop {
            match fills.recv().await {
                Ok(event) => tracker.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Fill listener lagged, outcomes lost");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Fill stream closed");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sentinel_core::{OrderPurpose, OrderSide};
    use sentinel_microstructure::{spawn_fill_learner, FillModelConfig};
    use std::time::Duration;

    fn features() -> FillFeatures {
        FillFeatures {
            qty: 2000.0,
            queue_ahead: 5000.0,
            latency_us: 0.0,
        }
    }

    fn entry(qty: Size) -> OrderRequest {
        OrderRequest::market(Symbol::new("AAPL"), OrderSide::Buy, qty, "primary", OrderPurpose::Entry)
    }

    fn learner(batch_size: usize) -> FillLearnerHandle {
        let config = FillModelConfig {
            batch_size,
            ..Default::default()
        };
        spawn_fill_learner(config).0
    }

    async fn wait_fitted(learner: &FillLearnerHandle, symbol: &Symbol) {
        for _ in 0..100 {
            if learner.is_fitted(symbol) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_partial_fills_label_unfilled() {
        let learner = learner(2);
        let tracker = FillTracker::new(learner.clone());
        let symbol = Symbol::new("AAPL");

        for _ in 0..2 {
            let order = entry(Size::new(dec!(2000)));
            tracker.track(&order, features());
            tracker.on_fill(&order.cloid, Size::new(dec!(1)), false);
        }
        wait_fitted(&learner, &symbol).await;
        assert!(learner.is_fitted(&symbol));
        assert!(learner.predict(&symbol, &features()) < 0.5);
        assert_eq!(tracker.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_complete_fill_labels_filled_and_stops_tracking() {
        let learner = learner(1);
        let tracker = FillTracker::new(learner.clone());
        let order = entry(Size::new(dec!(2000)));
        tracker.track(&order, features());

        tracker.on_fill(&order.cloid, Size::new(dec!(2000)), false);
        assert_eq!(tracker.pending_count(), 0);

        let symbol = Symbol::new("AAPL");
        wait_fitted(&learner, &symbol).await;
        assert!(learner.predict(&symbol, &features()) > 0.5);
    }

    #[tokio::test]
    async fn test_repeated_report_is_one_sample() {
        let learner = learner(2);
        let tracker = FillTracker::new(learner.clone());
        let order = entry(Size::new(dec!(2000)));
        tracker.track(&order, features());

        tracker.on_fill(&order.cloid, Size::new(dec!(500)), false);
        tracker.on_fill(&order.cloid, Size::new(dec!(500)), false);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!learner.is_fitted(&Symbol::new("AAPL")));
    }

    #[tokio::test]
    async fn test_done_without_fill_is_negative() {
        let learner = learner(1);
        let tracker = FillTracker::new(learner.clone());
        let order = entry(Size::new(dec!(2000)));
        tracker.track(&order, features());

        tracker.on_event(&FillEvent {
            cloid: order.cloid.clone(),
            filled_qty: Size::ZERO,
            avg_price: None,
            done: true,
        });
        assert_eq!(tracker.pending_count(), 0);

        let symbol = Symbol::new("AAPL");
        wait_fitted(&learner, &symbol).await;
        assert!(learner.predict(&symbol, &features()) < 0.5);
    }

    #[tokio::test]
    async fn test_listener_applies_events() {
        let learner = learner(1);
        let tracker = Arc::new(FillTracker::new(learner.clone()));
        let order = entry(Size::new(dec!(100)));
        tracker.track(&order, features());

        let (tx, rx) = broadcast::channel(8);
        let handle = spawn_fill_listener(tracker.clone(), rx);
        tx.send(FillEvent {
            cloid: order.cloid.clone(),
            filled_qty: Size::new(dec!(100)),
            avg_price: None,
            done: true,
        })
        .unwrap();
        drop(tx);
        handle.await.unwrap();
        assert_eq!(tracker.pending_count(), 0);
    }
}
