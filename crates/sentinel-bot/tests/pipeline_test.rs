//! End-to-end behavior of the execution gate against paper collaborators.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sentinel_bot::{AppConfig, Application, RunSummary};
use sentinel_core::{
    AccountState, OrderAction, OrderPurpose, OrderSide, OrderType, OutcomeStatus, Price,
    ReasonCode, Size, Symbol, TradingSignal,
};
use sentinel_executor::{
    fixture_book, CoordinatorConfig, ExecutionCoordinator, FixtureAccount, FixtureMarketData,
    PaperFixture, PaperVenue,
};
use sentinel_microstructure::{ImpactEstimator, RouteStyle, RouterConfig, SmartRouter};
use sentinel_risk::{
    FixedMacroCalendar, HedgeCalculator, InMemoryReturnHistory, PortfolioConfig,
    PortfolioRiskMonitor, PositionSizer, RegTConfig, RegTMonitor, RiskConfig, RiskGate,
    SessionRiskState,
};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/paper_fixture.json");
const DEFAULT_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/default.toml");

fn account(nav: Decimal, sma: Decimal) -> AccountState {
    AccountState::new(
        Price::new(nav),
        Price::new(dec!(90000)),
        Price::new(dec!(10000)),
        Price::new(sma),
        Price::new(dec!(200000)),
    )
}

fn buy(symbol: &str) -> TradingSignal {
    TradingSignal::new(symbol, OrderAction::Buy, 0.9)
}

// ============================================================================
// Component properties
// ============================================================================

#[test]
fn test_scenario_a_impact_walk() {
    let asks: Vec<_> = [dec!(50.01), dec!(50.02), dec!(50.03), dec!(50.04), dec!(50.05)]
        .into_iter()
        .map(|p| (p, dec!(100)))
        .collect();
    let book = fixture_book("AAPL", &[(dec!(50.00), dec!(100))], &asks).unwrap();

    let estimate = ImpactEstimator::from_config(&Default::default())
        .estimate(Size::new(dec!(250)), OrderSide::Buy, &book)
        .unwrap();

    assert_eq!(estimate.expected_price, Price::new(dec!(50.03)));
    assert!((estimate.participation - dec!(0.1667)).abs() < dec!(0.0001));
    assert!((estimate.slippage_bps - dec!(4.0)).abs() < dec!(0.01));
}

#[test]
fn test_scenario_b_sizing() {
    let sized = PositionSizer::new(&RiskConfig::default()).size(
        Price::new(dec!(100000)),
        Price::new(dec!(50)),
        dec!(0.1),
    );
    assert_eq!(sized.action, OrderAction::Buy);
    assert_eq!(sized.qty, Size::new(dec!(2000)));
    assert_eq!(sized.stop, Price::new(dec!(49.5)));
    assert_eq!(sized.take, Price::new(dec!(51.0)));
}

#[test]
fn test_margin_above_buffer_holds() {
    let sized = PositionSizer::new(&RiskConfig::default()).size(
        Price::new(dec!(100000)),
        Price::new(dec!(50)),
        dec!(0.81),
    );
    assert!(sized.is_hold());
    assert_eq!(sized.qty, Size::ZERO);
}

#[test]
fn test_half_top_level_routes_aggressive() {
    let book = fixture_book(
        "AAPL",
        &[(dec!(49.99), dec!(400))],
        &[(dec!(50.01), dec!(400))],
    )
    .unwrap();
    let router = SmartRouter::new(&RouterConfig::default());

    let at_half = router.route(&book, OrderSide::Buy, Size::new(dec!(200)));
    assert_eq!(at_half.style, RouteStyle::Aggressive);

    let below_half = router.route(&book, OrderSide::Buy, Size::new(dec!(199)));
    assert_eq!(below_half.style, RouteStyle::Passive);
}

#[test]
fn test_hedge_quantity_for_beta() {
    assert_eq!(HedgeCalculator::hedge_qty(dec!(100), dec!(1.2)), -120);
}

#[test]
fn test_reg_t_ratio_at_minimum_is_not_breach() {
    let monitor = RegTMonitor::new(&RegTConfig::default());
    let snapshot = monitor.snapshot(&account(dec!(100000), dec!(10000)));
    assert_eq!(snapshot.sma_ratio, dec!(0.1));
    assert!(!snapshot.breach);

    let snapshot = monitor.snapshot(&account(dec!(100000), dec!(9999)));
    assert!(snapshot.breach);
}

#[test]
fn test_zero_positions_snapshot_is_zero() {
    let monitor = PortfolioRiskMonitor::new(
        &PortfolioConfig::default(),
        Arc::new(InMemoryReturnHistory::new(10)),
    );
    let snapshot = monitor.snapshot(&[], &HashMap::new());
    assert!(!snapshot.is_degraded());
    assert_eq!(snapshot.net_exposure, Decimal::ZERO);
    assert_eq!(snapshot.var_95, 0.0);
    assert!(snapshot.sector_deltas.is_empty());
}

#[test]
fn test_first_admission_sets_baseline() {
    let session = SessionRiskState::new(dec!(0.02));
    assert!(session.admit(Price::new(dec!(100000))));
    assert_eq!(session.daily_pnl_pct(), Decimal::ZERO);
    assert_eq!(session.start_nav(), Some(Price::new(dec!(100000))));
}

// ============================================================================
// Coordinator against paper collaborators
// ============================================================================

struct Desk {
    account: Arc<FixtureAccount>,
    venue: Arc<PaperVenue>,
    coordinator: Arc<ExecutionCoordinator>,
}

fn desk() -> Desk {
    let market = Arc::new(FixtureMarketData::new());
    market.set_book(
        fixture_book(
            "AAPL",
            &[(dec!(49.99), dec!(5000)), (dec!(49.98), dec!(5000))],
            &[(dec!(50.01), dec!(5000)), (dec!(50.02), dec!(5000))],
        )
        .unwrap(),
    );
    market.set_price("AAPL", Price::new(dec!(50)));

    let account = Arc::new(FixtureAccount::new(account(dec!(100000), dec!(30000))));
    let venue = Arc::new(PaperVenue::new());
    let config = CoordinatorConfig::default();
    let gate = RiskGate::new(
        Arc::new(SessionRiskState::new(config.risk.max_daily_loss_pct)),
        Some(Arc::new(FixedMacroCalendar::new(Ok(false)))),
    );
    let coordinator = ExecutionCoordinator::new(
        &config,
        gate,
        Arc::new(InMemoryReturnHistory::from_values(250, vec![100.0, -100.0])),
        market,
        account.clone(),
        venue.clone(),
    );
    Desk {
        account,
        venue,
        coordinator: Arc::new(coordinator),
    }
}

#[tokio::test]
async fn test_kill_switch_sticks_after_recovery() {
    let desk = desk();
    assert!(desk.coordinator.process(&buy("AAPL")).await.is_executed());

    desk.account.set_nav(Price::new(dec!(97999)));
    let outcome = desk.coordinator.process(&buy("AAPL")).await;
    assert_eq!(outcome.status, OutcomeStatus::Skipped);
    assert_eq!(outcome.reason, ReasonCode::KillSwitch);

    desk.account.set_nav(Price::new(dec!(105000)));
    let outcome = desk.coordinator.process(&buy("AAPL")).await;
    assert_eq!(outcome.reason, ReasonCode::KillSwitch);

    desk.coordinator.session().reset();
    assert!(desk.coordinator.process(&buy("AAPL")).await.is_executed());
}

#[tokio::test]
async fn test_concurrent_signals_share_one_baseline() {
    let desk = desk();
    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let coordinator = desk.coordinator.clone();
            tokio::spawn(async move { coordinator.process(&buy("AAPL")).await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_executed());
    }
    assert_eq!(
        desk.coordinator.session().start_nav(),
        Some(Price::new(dec!(100000)))
    );
    let entries = desk
        .venue
        .orders()
        .into_iter()
        .filter(|o| o.purpose == OrderPurpose::Entry)
        .count();
    assert_eq!(entries, 4);
}

#[tokio::test]
async fn test_reg_t_breach_flattens_positions() {
    let desk = desk();
    desk.account.set_account(Ok(account(dec!(100000), dec!(5000))));
    desk.account.set_positions(Ok(vec![sentinel_core::Position::new(
        Symbol::new("AAPL"),
        Size::new(dec!(300)),
        Price::new(dec!(48)),
    )]));

    let outcome = desk.coordinator.process(&buy("AAPL")).await;
    assert_eq!(outcome.status, OutcomeStatus::Flattened);
    assert_eq!(outcome.reason, ReasonCode::RegTBreach);

    let orders = desk.venue.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].purpose, OrderPurpose::Flatten);
    assert_eq!(orders[0].side, OrderSide::Sell);
    assert_eq!(orders[0].qty, Size::new(dec!(300)));
}

// ============================================================================
// Application
// ============================================================================

fn app_config(audit_dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.paper.fixture = FIXTURE.into();
    config.audit.data_dir = audit_dir.to_path_buf();
    // Wall-clock pre-close flatten stays out of these runs.
    config.session.flatten_before_close_min = 0;
    config
}

#[test]
fn test_shipped_config_is_valid() {
    let config = AppConfig::from_file(DEFAULT_CONFIG).unwrap();
    config.validate().unwrap();
    assert_eq!(config.hedge.instrument, "SPY");
    assert_eq!(
        config.portfolio.sectors.get("AAPL").map(String::as_str),
        Some("TECH")
    );

    let fixture = PaperFixture::load(FIXTURE).unwrap();
    assert!(fixture.account.is_valid());
    assert!(fixture.pnl_history.len() >= 2);
}

#[tokio::test]
async fn test_signal_stream_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let app = Application::new(app_config(dir.path())).unwrap();
    let venue = app.venue().clone();

    let input = concat!(
        r#"{"symbol":"AAPL","action":"BUY","confidence":0.9}"#,
        "\n",
        "not a signal\n",
        "\n",
        r#"{"symbol":"AAPL","action":"HOLD","confidence":0.1}"#,
        "\n",
    );
    let summary = app.run_signals(input.as_bytes()).await.unwrap();

    assert_eq!(
        summary,
        RunSummary {
            signals: 2,
            executed: 1,
            skipped: 1,
            flattened: 0,
            rejected: 1,
        }
    );

    let orders = venue.orders();
    assert_eq!(orders.len(), 3);
    let entry = orders
        .iter()
        .find(|o| o.purpose == OrderPurpose::Entry)
        .unwrap();
    assert_eq!(entry.symbol, Symbol::new("AAPL"));
    assert_eq!(entry.side, OrderSide::Buy);
    assert_eq!(entry.order_type, OrderType::Limit);
    let hedge = orders
        .iter()
        .find(|o| o.purpose == OrderPurpose::Hedge)
        .unwrap();
    assert_eq!(hedge.symbol, Symbol::new("SPY"));
    assert_eq!(hedge.side, OrderSide::Sell);
    assert_eq!(hedge.qty, entry.qty);
    // Paper positions are static: shutdown closes the fixture's MSFT holding.
    let flatten = orders.last().unwrap();
    assert_eq!(flatten.purpose, OrderPurpose::Flatten);
    assert_eq!(flatten.symbol, Symbol::new("MSFT"));
    assert_eq!(flatten.side, OrderSide::Sell);
    assert_eq!(flatten.qty, Size::new(dec!(20)));

    let audit_lines: usize = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
        .map(|content| content.lines().count())
        .sum();
    assert_eq!(audit_lines, 2);
}

#[tokio::test]
async fn test_shutdown_flattens_open_positions() {
    let dir = tempfile::tempdir().unwrap();
    let app = Application::new(app_config(dir.path())).unwrap();
    let venue = app.venue().clone();

    let summary = app.run_signals(&b""[..]).await.unwrap();
    assert_eq!(summary, RunSummary::default());

    let orders = venue.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].purpose, OrderPurpose::Flatten);
    assert_eq!(orders[0].order_type, OrderType::Market);
    assert_eq!(orders[0].symbol, Symbol::new("MSFT"));
    assert_eq!(orders[0].side, OrderSide::Sell);
    assert_eq!(orders[0].qty, Size::new(dec!(20)));
}

#[tokio::test]
async fn test_shutdown_flatten_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = app_config(dir.path());
    config.session.flatten_on_shutdown = false;
    let app = Application::new(config).unwrap();
    let venue = app.venue().clone();

    app.run_signals(&b""[..]).await.unwrap();
    assert!(venue.orders().is_empty());
}

#[tokio::test]
async fn test_missing_fixture_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = app_config(dir.path());
    config.paper.fixture = dir.path().join("missing.json");
    assert!(Application::new(config).is_err());
}

#[tokio::test]
async fn test_audit_disabled_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let audit_dir = dir.path().join("audit");
    let mut config = app_config(&audit_dir);
    config.audit.enabled = false;

    let app = Application::new(config).unwrap();
    let summary = app
        .run_signals(&br#"{"symbol":"AAPL","action":"BUY","confidence":0.9}"#[..])
        .await
        .unwrap();
    assert_eq!(summary.executed, 1);
    assert!(!audit_dir.exists());
}
