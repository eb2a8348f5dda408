//! Decision audit trail.
//!
//! The coordinator pushes one [`AuditRecord`] per decision onto a bounded
//! [`AuditQueue`] and never waits on it. When the queue is full the oldest
//! record is dropped and counted. A single writer task drains the queue into
//! daily JSON Lines files; write failures are logged and the record is lost.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sentinel_core::{
    ExecutionOutcome, OrderRequest, OutcomeStatus, ReasonCode, Symbol, TradingSignal,
};
use sentinel_microstructure::{ImpactEstimate, MicroPriceResult, Route};
use sentinel_persistence::JsonLinesWriter;
use sentinel_risk::{RegTSnapshot, RiskSnapshot, SizedOrder};
use sentinel_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ============================================================================
// AuditRecord
// ============================================================================

/// Everything the pipeline saw for one signal. Stages that did not run leave
/// their field empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub cycle_id: u64,
    pub symbol: Symbol,
    pub signal: TradingSignal,
    pub status: Option<OutcomeStatus>,
    pub reason: Option<ReasonCode>,
    pub sized: Option<SizedOrder>,
    pub impact: Option<ImpactEstimate>,
    pub micro: Option<MicroPriceResult>,
    pub reg_t: Option<RegTSnapshot>,
    pub risk: Option<RiskSnapshot>,
    pub route: Option<Route>,
    pub fill_probability: Option<f64>,
    pub order: Option<OrderRequest>,
    pub hedge_order: Option<OrderRequest>,
}

impl AuditRecord {
    #[must_use]
    pub fn new(cycle_id: u64, signal: &TradingSignal) -> Self {
        Self {
            timestamp: Utc::now(),
            cycle_id,
            symbol: signal.symbol.clone(),
            signal: signal.clone(),
            status: None,
            reason: None,
            sized: None,
            impact: None,
            micro: None,
            reg_t: None,
            risk: None,
            route: None,
            fill_probability: None,
            order: None,
            hedge_order: None,
        }
    }

    /// Stamp the terminal outcome.
    pub fn finish(&mut self, outcome: &ExecutionOutcome) {
        self.status = Some(outcome.status);
        self.reason = Some(outcome.reason);
        self.order = outcome.order.clone();
        self.hedge_order = outcome.hedge_order.clone();
    }
}

// ============================================================================
// AuditQueue
// ============================================================================

/// Bounded drop-oldest queue with a single consumer.
#[derive(Debug)]
pub struct AuditQueue {
    records: Mutex<VecDeque<AuditRecord>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl AuditQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue without blocking. Evicts the oldest record when full.
    pub fn push(&self, record: AuditRecord) {
        if self.closed.load(Ordering::Acquire) {
            debug!(cycle_id = record.cycle_id, "Audit queue closed, record discarded");
            return;
        }
        {
            let mut records = self.records.lock();
            if records.len() >= self.capacity {
                if let Some(evicted) = records.pop_front() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    Metrics::audit_dropped();
                    warn!(cycle_id = evicted.cycle_id, "Audit queue full, oldest record dropped");
                }
            }
            records.push_back(record);
        }
        self.notify.notify_one();
    }

    /// Next record; `None` once closed and drained.
    pub async fn pop(&self) -> Option<AuditRecord> {
        loop {
            if let Some(record) = self.try_pop() {
                return Some(record);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    #[must_use]
    pub fn try_pop(&self) -> Option<AuditRecord> {
        self.records.lock().pop_front()
    }

    /// Stop accepting records; the consumer drains what is left.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Spawn the consumer writing records to `writer`. Ends after `close()` once
/// the queue is drained.
pub fn spawn_audit_writer(queue: Arc<AuditQueue>, mut writer: JsonLinesWriter) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Audit writer started");
        while let Some(record) = queue.pop().await {
            if let Err(e) = writer.append(&record) {
                warn!(cycle_id = record.cycle_id, error = %e, "Audit record write failed");
            }
            if queue.is_empty() {
                if let Err(e) = writer.flush() {
                    warn!(error = %e, "Audit flush failed");
                }
            }
        }
        if let Err(e) = writer.close() {
            warn!(error = %e, "Audit writer close failed");
        }
        info!(dropped = queue.dropped(), "Audit writer stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::OrderAction;

    fn record(cycle_id: u64) -> AuditRecord {
        AuditRecord::new(cycle_id, &TradingSignal::new("AAPL", OrderAction::Buy, 0.8))
    }

    #[test]
    fn test_drop_oldest_when_full() {
        let queue = AuditQueue::new(2);
        queue.push(record(1));
        queue.push(record(2));
        queue.push(record(3));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.try_pop().unwrap().cycle_id, 2);
        assert_eq!(queue.try_pop().unwrap().cycle_id, 3);
    }

    #[test]
    fn test_finish_stamps_outcome() {
        let mut rec = record(1);
        rec.finish(&ExecutionOutcome::skipped(
            Symbol::new("AAPL"),
            ReasonCode::MacroEvent,
        ));
        assert_eq!(rec.status, Some(OutcomeStatus::Skipped));
        assert_eq!(rec.reason, Some(ReasonCode::MacroEvent));
    }

    #[tokio::test]
    async fn test_pop_returns_none_after_close_and_drain() {
        let queue = AuditQueue::new(4);
        queue.push(record(1));
        queue.close();
        assert_eq!(queue.pop().await.unwrap().cycle_id, 1);
        assert!(queue.pop().await.is_none());

        queue.push(record(2));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_writer_persists_records() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonLinesWriter::new(dir.path(), "audit", 8).unwrap();
        let path = writer.path_for(Utc::now().date_naive());

        let queue = Arc::new(AuditQueue::new(16));
        let handle = spawn_audit_writer(queue.clone(), writer);
        queue.push(record(1));
        queue.push(record(2));
        queue.close();
        handle.await.unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: AuditRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.cycle_id, 1);
        assert_eq!(first.symbol, Symbol::new("AAPL"));
    }
}
