//! Main application orchestration.
//!
//! Builds the decision pipeline from configuration and drives it with
//! trading signals read as JSON lines.

use std::sync::Arc;

use sentinel_core::{ExecutionOutcome, OutcomeStatus, ReasonCode, TradingSignal};
use sentinel_executor::{
    spawn_audit_writer, AuditQueue, ExecutionCoordinator, FlattenOutcome, PaperFixture,
    PaperVenue,
};
use sentinel_microstructure::spawn_fill_learner;
use sentinel_persistence::JsonLinesWriter;
use sentinel_risk::{
    HttpMacroCalendar, InMemoryReturnHistory, MacroCalendar, RiskGate, SessionResetSchedule,
    SessionRiskState,
};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use crate::close_flatten::spawn_close_flatten;
use crate::config::AppConfig;
use crate::error::AppResult;
use crate::metrics_server::run_metrics_server;
use crate::session_reset::spawn_session_reset;

/// Counts for one run over a signal stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub signals: u64,
    pub executed: u64,
    pub skipped: u64,
    pub flattened: u64,
    /// Lines that did not parse as a trading signal.
    pub rejected: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &ExecutionOutcome) {
        match outcome.status {
            OutcomeStatus::Executed => self.executed += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
            OutcomeStatus::Flattened => self.flattened += 1,
        }
    }
}

struct AuditTask {
    queue: Arc<AuditQueue>,
    handle: JoinHandle<()>,
}

/// Main application.
pub struct Application {
    config: AppConfig,
    coordinator: Arc<ExecutionCoordinator>,
    venue: Arc<PaperVenue>,
    history: Arc<InMemoryReturnHistory>,
    schedule: SessionResetSchedule,
    close_schedule: Option<SessionResetSchedule>,
    audit: Option<AuditTask>,
    fill_learner: JoinHandle<()>,
    fill_listener: Option<JoinHandle<()>>,
}

impl Application {
    /// Create the application with paper collaborators loaded from
    /// `[paper] fixture`. Must be called inside a Tokio runtime.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let fixture = PaperFixture::load(&config.paper.fixture)?;
        Self::with_fixture(config, fixture)
    }

    /// Create the application from an already loaded fixture.
    pub fn with_fixture(config: AppConfig, mut fixture: PaperFixture) -> AppResult<Self> {
        config.validate()?;

        let history = Arc::new(InMemoryReturnHistory::from_values(
            config.paper.history_capacity,
            std::mem::take(&mut fixture.pnl_history),
        ));
        let (market, account) = fixture.into_collaborators();
        let venue = Arc::new(PaperVenue::new());
        venue.set_report_fills(config.paper.report_fills);

        let session = Arc::new(SessionRiskState::new(config.risk.max_daily_loss_pct));
        let calendar = HttpMacroCalendar::from_config(&config.macro_calendar)?
            .map(|c| Arc::new(c) as Arc<dyn MacroCalendar>);
        if calendar.is_none() {
            warn!("No macro calendar configured, every day is treated as clear");
        }
        let gate = RiskGate::new(session, calendar);
        let schedule = SessionResetSchedule::from_config(&config.session)?;
        let close_schedule = config
            .session
            .preclose_flatten_time()?
            .map(SessionResetSchedule::new);

        let (learner, fill_learner) = spawn_fill_learner(config.fill_model.clone());
        let mut coordinator = ExecutionCoordinator::new(
            &config.coordinator_config(),
            gate,
            history.clone(),
            Arc::new(market),
            Arc::new(account),
            venue.clone(),
        )
        .with_fill_learner(learner);

        let audit = if config.audit.enabled {
            let queue = Arc::new(AuditQueue::new(config.audit.queue_capacity));
            let writer =
                JsonLinesWriter::new(&config.audit.data_dir, "audit", config.audit.flush_every)?;
            let handle = spawn_audit_writer(queue.clone(), writer);
            coordinator = coordinator.with_audit(queue.clone());
            info!(data_dir = %config.audit.data_dir.display(), "Audit trail enabled");
            Some(AuditTask { queue, handle })
        } else {
            None
        };

        let fill_listener = coordinator.spawn_fill_listener();

        Ok(Self {
            config,
            coordinator: Arc::new(coordinator),
            venue,
            history,
            schedule,
            close_schedule,
            audit,
            fill_learner,
            fill_listener,
        })
    }

    #[must_use]
    pub fn coordinator(&self) -> &Arc<ExecutionCoordinator> {
        &self.coordinator
    }

    /// Paper venue receiving every order.
    #[must_use]
    pub fn venue(&self) -> &Arc<PaperVenue> {
        &self.venue
    }

    /// Serve metrics and process signals from stdin until EOF or Ctrl-C.
    pub async fn run(self) -> AppResult<RunSummary> {
        let port = self.config.telemetry.metrics_port;
        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = run_metrics_server(port).await {
                error!(error = %e, port, "Metrics server failed");
            }
        });

        let result = self.run_signals(BufReader::new(tokio::io::stdin())).await;
        metrics_handle.abort();
        result
    }

    /// Process one signal per line of `reader`.
    ///
    /// Signals run concurrently; the coordinator's account lock serializes
    /// their sizing. Returns after EOF once every in-flight decision is done,
    /// or on Ctrl-C after aborting in-flight decisions. Either way every
    /// position is flattened first when `session.flatten_on_shutdown` is set;
    /// the flatten also cancels orders left unacknowledged by an abort.
    pub async fn run_signals<R>(self, reader: R) -> AppResult<RunSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        info!("Starting application");
        let reset_handle = spawn_session_reset(
            self.coordinator.session().clone(),
            self.schedule,
            self.history.clone(),
        );
        let close_handle = self
            .close_schedule
            .map(|schedule| spawn_close_flatten(self.coordinator.clone(), schedule));

        let mut summary = RunSummary::default();
        let mut lines = reader.lines();
        let mut pending: JoinSet<ExecutionOutcome> = JoinSet::new();
        let mut input_open = true;

        loop {
            tokio::select! {
                line = lines.next_line(), if input_open => {
                    match line {
                        Ok(Some(line)) => self.dispatch(&line, &mut pending, &mut summary),
                        Ok(None) => {
                            info!("Signal input closed");
                            input_open = false;
                        }
                        Err(e) => {
                            error!(error = %e, "Signal input read failed");
                            input_open = false;
                        }
                    }
                }

                Some(joined) = pending.join_next() => match joined {
                    Ok(outcome) => summary.record(&outcome),
                    Err(e) => error!(error = %e, "Decision task failed"),
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    pending.abort_all();
                    break;
                }
            }

            if !input_open && pending.is_empty() {
                break;
            }
        }

        while pending.join_next().await.is_some() {}
        reset_handle.abort();
        if let Some(handle) = close_handle {
            handle.abort();
        }
        self.shutdown(summary).await
    }

    fn dispatch(
        &self,
        line: &str,
        pending: &mut JoinSet<ExecutionOutcome>,
        summary: &mut RunSummary,
    ) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let signal: TradingSignal = match serde_json::from_str(line) {
            Ok(signal) => signal,
            Err(e) => {
                summary.rejected += 1;
                warn!(error = %e, "Ignoring malformed signal line");
                return;
            }
        };
        summary.signals += 1;

        let coordinator = self.coordinator.clone();
        pending.spawn(async move {
            let outcome = coordinator.process(&signal).await;
            info!(
                symbol = %outcome.symbol,
                status = outcome.status.as_str(),
                reason = outcome.reason.as_str(),
                "Decision complete"
            );
            outcome
        });
    }

    async fn shutdown(self, summary: RunSummary) -> AppResult<RunSummary> {
        info!(?summary, "Shutting down");

        if self.config.session.flatten_on_shutdown {
            info!("Flattening positions before exit");
            match self.coordinator.flatten_all(ReasonCode::Shutdown).await {
                FlattenOutcome::Completed(report) if report.failures > 0 => {
                    error!(failures = report.failures, "Shutdown flatten completed with failures");
                }
                FlattenOutcome::Completed(report) => {
                    info!(orders = report.orders.len(), cancelled = report.cancelled, "Shutdown flatten complete");
                }
                FlattenOutcome::AlreadyInProgress => warn!("Flatten already running at shutdown"),
            }
        }

        // Fill models live in memory only.
        if let Some(listener) = self.fill_listener {
            listener.abort();
        }
        self.fill_learner.abort();

        if let Some(audit) = self.audit {
            audit.queue.close();
            if let Err(e) = audit.handle.await {
                warn!(error = %e, "Audit writer task ended abnormally");
            }
        }
        Ok(summary)
    }
}
