//! Per-signal decision pipeline.
//!
//! # Stage Order (Strict)
//!
//! 0.  Signal action HOLD          → Skipped(HoldSignal)
//! 1.  RiskGate::admit             → Skipped(KillSwitch)
//! 2.  RiskGate::macro_clear       → Skipped(MacroEvent)
//! 3.  PositionSizer::size_for     → Skipped(PriceUnavailable | ZeroSize)
//! 4.  Book fetch (deadline)       → Skipped(BookTimeout | BookUnavailable)
//! 5.  ImpactEstimator::estimate   → Skipped(SlippageLimit)
//! 6.  MicroPriceEngine::compute   → Skipped(AdverseSelection)
//! 7.  RegTMonitor::snapshot       → Flattened(RegTBreach)
//! 8.  PortfolioRiskMonitor        → Flattened(RiskDegraded | VarBreach)
//! 9.  SmartRouter::route          → limit (PASSIVE) or market (AGGRESSIVE) order
//! 10. Submit                      → Skipped(FlattenInProgress | SubmitFailed | Superseded)
//! 11. HedgeCalculator             → companion market order
//! 12. Audit record                → fire-and-forget
//!
//! Entry fills reach the fill-probability learner through [`FillTracker`]: the
//! acknowledgment's fill is applied inline and later executions arrive on the
//! venue's fill stream.
//!
//! Account reads, sizing and submission run under one async account lock so
//! two instruments never size against the same pre-update NAV. A bad cycle
//! returns an outcome; it never panics or blocks the next signal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sentinel_core::{
    AccountState, ClientOrderId, ExecutionOutcome, OrderBookSnapshot, OrderPurpose,
    OrderRequest, OrderSide, Price, ReasonCode, Symbol, TradingSignal,
};
use sentinel_microstructure::{
    FillFeatures, FillLearnerHandle, ImpactEstimator, MicroPriceEngine, RouteStyle,
    SmartRouter, COLD_START_PROBABILITY,
};
use sentinel_risk::{
    HedgeCalculator, PortfolioRiskMonitor, PositionSizer, RegTMonitor, ReturnHistory, RiskGate,
    RiskSnapshot, SessionRiskState,
};
use sentinel_telemetry::Metrics;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::audit::{AuditQueue, AuditRecord};
use crate::collaborator::{AccountSource, ExecutionVenue, MarketData, VenueAck};
use crate::config::CoordinatorConfig;
use crate::fills::{spawn_fill_listener, FillTracker};
use crate::flatten::{flatten_all, FlattenOutcome};
use crate::ledger::{AckDisposition, OrderLedger};

/// Thresholds checked by the pipeline.
#[derive(Debug, Clone, Copy)]
struct Limits {
    max_slippage_bps: Decimal,
    max_cost_bps: Decimal,
    max_var_usd: Decimal,
    book_depth: usize,
    book_fetch_timeout: Duration,
}

pub struct ExecutionCoordinator {
    gate: RiskGate,
    sizer: PositionSizer,
    impact: ImpactEstimator,
    micro: MicroPriceEngine,
    router: SmartRouter,
    portfolio: PortfolioRiskMonitor,
    reg_t: RegTMonitor,
    hedger: HedgeCalculator,
    limits: Limits,

    market: Arc<dyn MarketData>,
    account: Arc<dyn AccountSource>,
    venue: Arc<dyn ExecutionVenue>,

    ledger: Arc<OrderLedger>,
    account_lock: AsyncMutex<()>,
    fill_learner: Option<FillLearnerHandle>,
    fills: Option<Arc<FillTracker>>,
    audit: Option<Arc<AuditQueue>>,
    cycle: AtomicU64,
}

impl ExecutionCoordinator {
    #[must_use]
    pub fn new(
        config: &CoordinatorConfig,
        gate: RiskGate,
        history: Arc<dyn ReturnHistory>,
        market: Arc<dyn MarketData>,
        account: Arc<dyn AccountSource>,
        venue: Arc<dyn ExecutionVenue>,
    ) -> Self {
        Self {
            gate,
            sizer: PositionSizer::new(&config.risk),
            impact: ImpactEstimator::from_config(&config.impact),
            micro: MicroPriceEngine::from_config(&config.micro),
            router: SmartRouter::new(&config.router),
            portfolio: PortfolioRiskMonitor::new(&config.portfolio, history),
            reg_t: RegTMonitor::new(&config.reg_t),
            hedger: HedgeCalculator::new(&config.hedge),
            limits: Limits {
                max_slippage_bps: config.impact.max_slippage_bps,
                max_cost_bps: config.micro.max_cost_bps,
                max_var_usd: config.portfolio.max_var_usd,
                book_depth: config.book.book_depth,
                book_fetch_timeout: config.book.fetch_timeout(),
            },
            market,
            account,
            venue,
            ledger: Arc::new(OrderLedger::new()),
            account_lock: AsyncMutex::new(()),
            fill_learner: None,
            fills: None,
            audit: None,
            cycle: AtomicU64::new(0),
        }
    }

    /// Feed entry fills to the fill-probability learner.
    #[must_use]
    pub fn with_fill_learner(mut self, learner: FillLearnerHandle) -> Self {
        self.fills = Some(Arc::new(FillTracker::new(learner.clone())));
        self.fill_learner = Some(learner);
        self
    }

    /// Apply the venue's fill stream to tracked entry orders.
    ///
    /// `None` without a fill learner. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn spawn_fill_listener(&self) -> Option<JoinHandle<()>> {
        let tracker = self.fills.clone()?;
        Some(spawn_fill_listener(tracker, self.venue.subscribe_fills()))
    }

    #[must_use]
    pub fn fill_tracker(&self) -> Option<&Arc<FillTracker>> {
        self.fills.as_ref()
    }

    /// Emit one audit record per decision.
    #[must_use]
    pub fn with_audit(mut self, queue: Arc<AuditQueue>) -> Self {
        self.audit = Some(queue);
        self
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionRiskState> {
        self.gate.session()
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<OrderLedger> {
        &self.ledger
    }

    /// Run the pipeline for one signal.
    pub async fn process(&self, signal: &TradingSignal) -> ExecutionOutcome {
        let cycle_id = self.cycle.fetch_add(1, Ordering::Relaxed) + 1;
        let span = info_span!("decision", symbol = %signal.symbol, cycle_id);

        let mut record = AuditRecord::new(cycle_id, signal);
        let outcome = self.run(signal, &mut record).instrument(span).await;

        Metrics::decision(outcome.status.as_str(), outcome.reason.as_str());
        if let Some(queue) = &self.audit {
            record.finish(&outcome);
            queue.push(record);
        }
        outcome
    }

    /// Flatten every position outside the signal pipeline.
    pub async fn flatten_all(&self, reason: ReasonCode) -> FlattenOutcome {
        flatten_all(
            &self.ledger,
            self.account.as_ref(),
            self.venue.as_ref(),
            self.router.default_venue(),
            reason,
        )
        .await
    }

    async fn run(&self, signal: &TradingSignal, record: &mut AuditRecord) -> ExecutionOutcome {
        let symbol = &signal.symbol;
        let Some(side) = signal.action.side() else {
            return skip(symbol, "signal", ReasonCode::HoldSignal);
        };
        debug!(%side, confidence = signal.confidence, "Signal received");

        let _account_guard = self.account_lock.lock().await;

        // Stage 1: kill-switch
        let account = self.read_account().await;
        if !self.gate.admit_account(&account) {
            return skip(symbol, "risk_gate", ReasonCode::KillSwitch);
        }

        // Stage 2: macro calendar
        if !self.gate.macro_clear(Utc::now().date_naive()).await {
            return skip(symbol, "macro_calendar", ReasonCode::MacroEvent);
        }

        // Stage 3: sizing
        let price = match self.market.last_price(symbol.clone()).await {
            Ok(price) => price,
            Err(e) => {
                Metrics::degraded_event("last_price");
                warn!(stage = "sizing", error = %e, "Last price unavailable");
                return skip(symbol, "sizing", ReasonCode::PriceUnavailable);
            }
        };
        let margin_usage = account.margin_usage();
        let sized = self.sizer.size_for(side, account.nav, price, margin_usage);
        record.sized = Some(sized);
        if sized.is_hold() {
            info!(
                stage = "sizing",
                nav = %account.nav,
                %price,
                %margin_usage,
                account_valid = account.is_valid(),
                "Zero-size order"
            );
            return skip(symbol, "sizing", ReasonCode::ZeroSize);
        }
        if self.sizer.exceeds_position_limit(&sized, account.nav) {
            info!(
                notional = %sized.notional(),
                limit = %self.sizer.max_position_notional(account.nav),
                "Sized order above max position notional"
            );
        }

        // Stage 4: one-shot book fetch with an absolute deadline
        let book = match self.fetch_book(symbol).await {
            Ok(book) => book,
            Err(reason) => return skip(symbol, "book", reason),
        };

        // Stage 5: market impact
        let Some(impact) = self.impact.estimate(sized.qty, side, &book) else {
            Metrics::degraded_event("empty_book");
            return skip(symbol, "impact", ReasonCode::BookUnavailable);
        };
        record.impact = Some(impact);
        Metrics::slippage_bps(symbol.as_str(), impact.slippage_bps.to_f64().unwrap_or(0.0));
        if impact.slippage_bps > self.limits.max_slippage_bps {
            info!(
                stage = "impact",
                slippage_bps = %impact.slippage_bps,
                max_slippage_bps = %self.limits.max_slippage_bps,
                expected_price = %impact.expected_price,
                "Slippage above limit"
            );
            return skip(symbol, "impact", ReasonCode::SlippageLimit);
        }

        // Stage 6: adverse selection
        let desired_qty = match side {
            OrderSide::Buy => sized.qty,
            OrderSide::Sell => -sized.qty,
        };
        let Some(micro) = self.micro.compute(&book, desired_qty) else {
            Metrics::degraded_event("empty_book");
            return skip(symbol, "micro_price", ReasonCode::BookUnavailable);
        };
        record.micro = Some(micro);
        Metrics::adverse_cost_bps(symbol.as_str(), micro.cost_bps.to_f64().unwrap_or(0.0));
        if micro.cost_bps > self.limits.max_cost_bps {
            info!(
                stage = "micro_price",
                cost_bps = %micro.cost_bps,
                max_cost_bps = %self.limits.max_cost_bps,
                imbalance = %micro.imbalance,
                "Adverse-selection cost above limit"
            );
            return skip(symbol, "micro_price", ReasonCode::AdverseSelection);
        }

        // Stage 7: Reg-T
        let reg_t = self.reg_t.snapshot(&account);
        record.reg_t = Some(reg_t);
        if reg_t.breach {
            return self.forced_flatten(symbol, ReasonCode::RegTBreach).await;
        }

        // Stage 8: portfolio VAR (fail-closed)
        let risk = self.risk_snapshot().await;
        let degraded = risk.is_degraded();
        let var_breach = risk.var_exceeds(self.limits.max_var_usd);
        let var_95 = risk.var_95;
        record.risk = Some(risk);
        if degraded {
            return self.forced_flatten(symbol, ReasonCode::RiskDegraded).await;
        }
        if var_breach {
            warn!(var_95, max_var_usd = %self.limits.max_var_usd, "VAR above limit");
            return self.forced_flatten(symbol, ReasonCode::VarBreach).await;
        }

        // Stage 9: routing
        let route = self.router.route(&book, side, sized.qty);
        let features = FillFeatures {
            qty: sized.qty.to_f64(),
            queue_ahead: route.queue_ahead.to_f64(),
            latency_us: book.latency_us() as f64,
        };
        let fill_probability = self
            .fill_learner
            .as_ref()
            .map(|l| l.predict(symbol, &features))
            .unwrap_or(COLD_START_PROBABILITY);
        Metrics::fill_probability(symbol.as_str(), fill_probability);
        record.fill_probability = Some(fill_probability);

        let order = OrderRequest {
            cloid: ClientOrderId::new(),
            symbol: symbol.clone(),
            side,
            qty: sized.qty,
            order_type: route.style.order_type(),
            limit_price: (route.style == RouteStyle::Passive).then_some(route.limit_price),
            stop: Some(signal.stop.unwrap_or(sized.stop)),
            take: Some(signal.take.unwrap_or(sized.take)),
            venue: route.venue.clone(),
            purpose: OrderPurpose::Entry,
            created_at: sentinel_core::now_ms(),
        };
        info!(
            stage = "route",
            style = %route.style,
            venue = %route.venue,
            fee_bps = %route.fee_bps,
            queue_ahead = %route.queue_ahead,
            fill_probability,
            "Order routed"
        );
        record.route = Some(route);

        // Stage 10: submission
        if let Some(fills) = &self.fills {
            fills.track(&order, features);
        }
        let ack = match self.submit(order.clone()).await {
            Ok(ack) => ack,
            Err(reason) => {
                if let Some(fills) = &self.fills {
                    fills.forget(&order.cloid);
                }
                return ExecutionOutcome::skipped(symbol.clone(), reason).with_order(order);
            }
        };
        if let (Some(fills), Some(fill)) = (&self.fills, ack.fill) {
            fills.on_fill(&order.cloid, fill.filled_qty, false);
        }

        // Stage 11: hedge
        let signed_qty = match side {
            OrderSide::Buy => sized.qty,
            OrderSide::Sell => -sized.qty,
        };
        let hedge_order = match self.hedger.instruction(signed_qty) {
            Some(hedge) => {
                let hedge_order = OrderRequest::market(
                    hedge.instrument.clone(),
                    hedge.side(),
                    hedge.size(),
                    order.venue.clone(),
                    OrderPurpose::Hedge,
                );
                match self.submit(hedge_order.clone()).await {
                    Ok(_) => Some(hedge_order),
                    Err(reason) => {
                        warn!(
                            stage = "hedge",
                            instrument = %hedge.instrument,
                            qty = hedge.qty,
                            reason = reason.as_str(),
                            "Hedge not placed"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        info!(
            cloid = %order.cloid,
            %side,
            qty = %order.qty,
            order_type = %order.order_type,
            hedged = hedge_order.is_some(),
            "Signal executed"
        );
        ExecutionOutcome::executed(order, hedge_order)
    }

    async fn read_account(&self) -> AccountState {
        match self.account.account().await {
            Ok(account) => account,
            Err(e) => {
                Metrics::degraded_event("account_read");
                warn!(stage = "risk_gate", error = %e, "Account read failed, using unavailable state");
                AccountState::unavailable()
            }
        }
    }

    async fn fetch_book(&self, symbol: &Symbol) -> Result<OrderBookSnapshot, ReasonCode> {
        let deadline = Instant::now() + self.limits.book_fetch_timeout;
        let fetch = self.market.fetch_book(symbol.clone(), self.limits.book_depth);
        match timeout_at(deadline, fetch).await {
            Err(_) => {
                Metrics::degraded_event("book_timeout");
                warn!(
                    stage = "book",
                    timeout_s = self.limits.book_fetch_timeout.as_secs_f64(),
                    "Book fetch deadline missed"
                );
                Err(ReasonCode::BookTimeout)
            }
            Ok(Err(e)) => {
                Metrics::degraded_event("book_fetch");
                warn!(stage = "book", error = %e, "Book fetch failed");
                Err(ReasonCode::BookUnavailable)
            }
            Ok(Ok(book)) if book.symbol() != symbol => {
                Metrics::degraded_event("book_fetch");
                warn!(stage = "book", book_symbol = %book.symbol(), "Book for wrong instrument");
                Err(ReasonCode::BookUnavailable)
            }
            Ok(Ok(book)) => Ok(book.truncated(self.limits.book_depth)),
        }
    }

    /// Positions valued at last price. Any read failure yields a degraded
    /// snapshot.
    async fn risk_snapshot(&self) -> RiskSnapshot {
        let positions = match self.account.positions().await {
            Ok(positions) => positions,
            Err(e) => {
                Metrics::degraded_event("positions_read");
                warn!(stage = "portfolio", error = %e, "Positions read failed");
                return RiskSnapshot::degraded(format!("positions unavailable: {e}"));
            }
        };

        let mut marks: HashMap<Symbol, Price> = HashMap::new();
        for position in positions.iter().filter(|p| !p.is_flat()) {
            if marks.contains_key(&position.symbol) {
                continue;
            }
            match self.market.last_price(position.symbol.clone()).await {
                Ok(price) => {
                    marks.insert(position.symbol.clone(), price);
                }
                Err(e) => {
                    warn!(stage = "portfolio", symbol = %position.symbol, error = %e, "Mark unavailable");
                }
            }
        }
        self.portfolio.snapshot(&positions, &marks)
    }

    async fn forced_flatten(&self, symbol: &Symbol, reason: ReasonCode) -> ExecutionOutcome {
        warn!(reason = reason.as_str(), "Forced flatten");
        match self.flatten_all(reason).await {
            FlattenOutcome::Completed(report) if report.failures > 0 => {
                error!(failures = report.failures, "Flatten completed with failures");
            }
            FlattenOutcome::Completed(_) | FlattenOutcome::AlreadyInProgress => {}
        }
        ExecutionOutcome::flattened(symbol.clone(), reason)
    }

    /// Register, submit and resolve one order against the ledger.
    async fn submit(&self, order: OrderRequest) -> Result<VenueAck, ReasonCode> {
        if self.ledger.register(&order).is_none() {
            info!(stage = "submit", purpose = order.purpose.as_str(), "Flatten in progress, order withheld");
            return Err(ReasonCode::FlattenInProgress);
        }
        let cloid = order.cloid.clone();
        let purpose = order.purpose;

        let ack = match self.venue.submit(order).await {
            Ok(ack) => ack,
            Err(e) => {
                self.ledger.fail(&cloid);
                Metrics::degraded_event("submit");
                error!(stage = "submit", %cloid, error = %e, kind = e.kind(), "Order submission failed");
                return Err(ReasonCode::SubmitFailed);
            }
        };

        match self.ledger.acknowledge(&cloid) {
            AckDisposition::Current => {
                Metrics::order_sent(purpose.as_str());
                debug!(%cloid, venue_order_id = %ack.venue_order_id, "Order acknowledged");
                Ok(ack)
            }
            AckDisposition::Superseded => {
                warn!(%cloid, "Order superseded by flatten, cancelling");
                if let Err(e) = self.venue.cancel(cloid.clone()).await {
                    error!(%cloid, error = %e, "Cancel of superseded order failed");
                }
                Err(ReasonCode::Superseded)
            }
        }
    }
}

fn skip(symbol: &Symbol, stage: &'static str, reason: ReasonCode) -> ExecutionOutcome {
    info!(stage, reason = reason.as_str(), "Signal skipped");
    ExecutionOutcome::skipped(symbol.clone(), reason)
}
