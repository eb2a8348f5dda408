//! In-flight order tracking and flatten supersession.
//!
//! Every order is registered under the current flatten epoch before it is
//! submitted. Starting a flatten bumps the epoch and drains the in-flight set,
//! so an acknowledgment that arrives afterwards is reported as superseded and
//! the order is cancelled instead of counting as executed. While a flatten is
//! running, registration is refused.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use sentinel_core::{ClientOrderId, OrderRequest};
use tracing::{debug, info, warn};

/// Order submitted but not yet acknowledged.
#[derive(Debug, Clone)]
pub struct InFlightOrder {
    pub order: OrderRequest,
    pub epoch: u64,
    pub registered_at: Instant,
}

/// What to do with an acknowledged order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDisposition {
    /// Registered under the current epoch.
    Current,
    /// A flatten started after submission; the order must be cancelled.
    Superseded,
}

#[derive(Debug, Default)]
struct LedgerInner {
    epoch: u64,
    in_flight: HashMap<ClientOrderId, InFlightOrder>,
}

#[derive(Debug, Default)]
pub struct OrderLedger {
    inner: Mutex<LedgerInner>,
    flattening: AtomicBool,
}

impl OrderLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    #[must_use]
    pub fn is_flattening(&self) -> bool {
        self.flattening.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    /// Track `order` before submission. Returns the epoch, or `None` while a
    /// flatten is in progress.
    pub fn register(&self, order: &OrderRequest) -> Option<u64> {
        let mut inner = self.inner.lock();
        // Checked under the lock so a concurrent begin_flatten either drains
        // this order or refuses it.
        if self.flattening.load(Ordering::Acquire) {
            debug!(cloid = %order.cloid, "Registration refused: flatten in progress");
            return None;
        }
        let epoch = inner.epoch;
        inner.in_flight.insert(
            order.cloid.clone(),
            InFlightOrder {
                order: order.clone(),
                epoch,
                registered_at: Instant::now(),
            },
        );
        Some(epoch)
    }

    /// Resolve an acknowledged order.
    pub fn acknowledge(&self, cloid: &ClientOrderId) -> AckDisposition {
        let mut inner = self.inner.lock();
        let current = inner.epoch;
        match inner.in_flight.remove(cloid) {
            Some(entry) if entry.epoch == current => AckDisposition::Current,
            Some(entry) => {
                warn!(%cloid, epoch = entry.epoch, current, "Acknowledged under stale epoch");
                AckDisposition::Superseded
            }
            None => {
                warn!(%cloid, "Acknowledged after flatten drained it");
                AckDisposition::Superseded
            }
        }
    }

    /// Forget an order whose submission failed.
    pub fn fail(&self, cloid: &ClientOrderId) {
        self.inner.lock().in_flight.remove(cloid);
    }

    /// Start a flatten: bump the epoch and drain unacknowledged orders.
    ///
    /// Returns `None` if a flatten is already running. The flatten ends when
    /// the returned guard is dropped.
    pub fn begin_flatten(&self) -> Option<(FlattenGuard<'_>, Vec<InFlightOrder>)> {
        let mut inner = self.inner.lock();
        if self
            .flattening
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        inner.epoch += 1;
        let drained: Vec<InFlightOrder> = inner.in_flight.drain().map(|(_, v)| v).collect();
        info!(
            epoch = inner.epoch,
            superseded = drained.len(),
            "Flatten started"
        );
        Some((FlattenGuard { ledger: self }, drained))
    }

    fn end_flatten(&self) {
        self.flattening.store(false, Ordering::Release);
        info!("Flatten finished");
    }
}

/// Keeps the ledger in flatten mode until dropped.
#[derive(Debug)]
pub struct FlattenGuard<'a> {
    ledger: &'a OrderLedger,
}

impl Drop for FlattenGuard<'_> {
    fn drop(&mut self) {
        self.ledger.end_flatten();
    }
}
