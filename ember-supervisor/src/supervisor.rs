//! The system supervisor (C8): drives the whole platform through
//! `INIT -> GENERATE -> BACKTEST -> OPTIMIZE -> {BACKTEST | GENERATE |
//! TRADING} -> STOPPED` off a private event queue, spawning and tearing
//! down squads along the way. Grounded in `system/system.py::System`,
//! restructured onto `tokio::sync::mpsc` the way `barter`'s
//! `Trader::run` loop drains an internal `Command` channel rather than a
//! shared bus.

use crate::collaborators::{Datasource, WebsocketFeed};
use crate::error::SupervisorError;
use crate::fsm::{SupervisorEvent, SupervisorState};
use crate::squad::{ExecutionMode, Squad};
use ember_bus::{EventBus, GroupKey, Meta, MsgKey};
use ember_execution::{ExchangeAdapter, MarginMode, PositionMode};
use ember_instrument::{Symbol, Timeframe};
use ember_position::events::{BacktestEnded, NewMarketDataReceived, PositionClosed};
use ember_position::Position;
use ember_strategy::{PerformanceAnalytics, Strategy, StrategyGenerator, StrategyKey, StrategyStorage};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{error, info, warn};

fn group_key(symbol: &Symbol, timeframe: Timeframe) -> GroupKey {
    GroupKey::new(format!("{}:{}", symbol.name, timeframe))
}

/// Owns the whole platform's lifecycle. Construct with [`Supervisor::new`]
/// then drive it with [`Supervisor::run`] (consumes `self`, runs until
/// `SystemStop`/`stop`).
pub struct Supervisor {
    state: SupervisorState,
    tx: mpsc::Sender<SupervisorEvent>,
    rx: mpsc::Receiver<SupervisorEvent>,
    symbols: Vec<Symbol>,
    timeframes: Vec<Timeframe>,
    population: Vec<(Symbol, Timeframe, Strategy)>,
    generator: Arc<AsyncMutex<Box<dyn StrategyGenerator>>>,
    storage: Arc<StrategyStorage>,
    analytics: Arc<dyn PerformanceAnalytics>,
    datasource: Arc<dyn Datasource>,
    websocket: Arc<dyn WebsocketFeed>,
    adapter: Arc<dyn ExchangeAdapter>,
    bus: Arc<EventBus>,
    config: crate::config::SupervisorConfig,
    squads: Vec<Squad>,
    next_seed: u64,
}

impl Supervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbols: Vec<Symbol>,
        timeframes: Vec<Timeframe>,
        generator: Arc<AsyncMutex<Box<dyn StrategyGenerator>>>,
        analytics: Arc<dyn PerformanceAnalytics>,
        datasource: Arc<dyn Datasource>,
        websocket: Arc<dyn WebsocketFeed>,
        adapter: Arc<dyn ExchangeAdapter>,
        bus: Arc<EventBus>,
        config: crate::config::SupervisorConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(16);
        Self {
            state: SupervisorState::Init,
            tx,
            rx,
            symbols,
            timeframes,
            population: Vec::new(),
            generator,
            storage: Arc::new(StrategyStorage::default()),
            analytics,
            datasource,
            websocket,
            adapter,
            bus,
            config,
            squads: Vec::new(),
            next_seed: 0,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// A handle callers can use to request a graceful stop from outside
    /// the `run` task (`System.stop`'s `event_queue.put_nowait`).
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle { tx: self.tx.clone() }
    }

    fn seed(&mut self) -> u64 {
        self.next_seed += 1;
        self.next_seed
    }

    /// Drains the internal event queue, dispatching each `(state, event)`
    /// pair to the matching phase. Starts by kicking off generation, the
    /// same way `System.start` seeds its queue with `Event.REGENERATE`.
    pub async fn run(mut self) {
        let _ = self.tx.send(SupervisorEvent::Regenerate).await;

        while let Some(event) = self.rx.recv().await {
            if event == SupervisorEvent::SystemStop {
                info!("supervisor stopping");
                self.state = SupervisorState::Stopped;
                break;
            }

            let outcome = match (self.state, event) {
                (SupervisorState::Init, SupervisorEvent::Regenerate)
                | (SupervisorState::Optimize, SupervisorEvent::Regenerate) => {
                    self.state = SupervisorState::Generate;
                    self.generate().await
                }
                (SupervisorState::Generate, SupervisorEvent::GenerateComplete) => {
                    self.state = SupervisorState::Backtest;
                    self.run_backtest().await
                }
                (SupervisorState::Optimize, SupervisorEvent::RunBacktest) => {
                    self.state = SupervisorState::Backtest;
                    self.run_backtest().await
                }
                (SupervisorState::Backtest, SupervisorEvent::BacktestComplete) => {
                    self.state = SupervisorState::Optimize;
                    self.run_optimization().await
                }
                (SupervisorState::Optimize, SupervisorEvent::OptimizationComplete) => {
                    self.state = SupervisorState::Trading;
                    self.run_trading().await.map(|()| None)
                }
                (state, event) => {
                    warn!(?state, ?event, "ignoring event not valid for current state");
                    Ok(None)
                }
            };

            match outcome {
                Ok(Some(next)) => {
                    let _ = self.tx.send(next).await;
                }
                Ok(None) => {}
                Err(err) => {
                    error!(error = %err, "supervisor phase failed, stopping");
                    self.state = SupervisorState::Stopped;
                    break;
                }
            }
        }
    }

    /// GENERATE: ask the strategy generator for an initial/refreshed
    /// population (`System._generate`). The generator owns population
    /// state internally — there is no separate accessor for it, so every
    /// phase that needs "the current candidates" re-invokes `generate()`,
    /// matching how `_run_backtest` re-reads `self.optimizer.population`
    /// after `_run_optimization` mutates it via `optimize()`.
    async fn generate(&mut self) -> Result<Option<SupervisorEvent>, SupervisorError> {
        info!("generating a new population");
        let mut generator = self.generator.lock().await;
        self.population = generator.generate(&self.symbols, &self.timeframes).await;
        Ok(Some(SupervisorEvent::GenerateComplete))
    }

    /// BACKTEST: run every `(symbol, timeframe, strategy)` candidate
    /// through a paper squad over `lookback_bars` historical bars, score
    /// its closed positions and upsert the result into `StrategyStorage`.
    /// Squads run sequentially — the source's `parallel_num` batching is
    /// a throughput optimization the core doesn't need to reproduce.
    async fn run_backtest(&mut self) -> Result<Option<SupervisorEvent>, SupervisorError> {
        let population = self.population.clone();
        info!(count = population.len(), "running backtest");

        for (symbol, timeframe, strategy) in population {
            self.backtest_one(&symbol, timeframe, &strategy).await?;
        }

        Ok(Some(SupervisorEvent::BacktestComplete))
    }

    async fn backtest_one(
        &mut self,
        symbol: &Symbol,
        timeframe: Timeframe,
        strategy: &Strategy,
    ) -> Result<(), SupervisorError> {
        let closed: Arc<StdMutex<Vec<Position>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = closed.clone();
        let filter_symbol = symbol.clone();
        let handle = self.bus.register_event::<PositionClosed, _, _>(
            Some(Arc::new(move |payload: &PositionClosed| {
                payload.position.signal.symbol == filter_symbol && payload.position.signal.timeframe == timeframe
            })),
            move |payload| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(payload.position.clone());
                    Ok(())
                }
            },
        );

        let rng = StdRng::seed_from_u64(self.seed());
        let squad = Squad::new(
            symbol.clone(),
            timeframe,
            strategy.clone(),
            self.config.default_size,
            rng,
            self.generator.clone(),
            ExecutionMode::Paper,
            self.bus.clone(),
        );
        squad.start().await;

        let bars = self
            .datasource
            .fetch_ohlcv(symbol, timeframe, self.config.lookback_bars)
            .await?;
        let last_close = bars.last().map(|b| b.close).unwrap_or_default();

        for ohlcv in &bars {
            self.bus
                .dispatch(NewMarketDataReceived {
                    meta: Meta::new(ember_position::events::priority::MARKET, group_key(symbol, timeframe), MsgKey::unique()),
                    symbol: symbol.clone(),
                    timeframe,
                    ohlcv: *ohlcv,
                    closed: true,
                })
                .await;
        }
        self.bus.wait().await;

        self.bus
            .dispatch(BacktestEnded {
                meta: Meta::new(ember_position::events::priority::POSITION, group_key(symbol, timeframe), MsgKey::unique()),
                exit_price: last_close,
            })
            .await;
        self.bus.wait().await;

        squad.stop(&self.bus).await;
        self.bus.unregister_event::<PositionClosed>(handle);

        let positions = closed.lock().unwrap().clone();
        let (vector, report) = self.analytics.evaluate(&positions).await;
        info!(
            symbol = %symbol.name,
            timeframe = %timeframe,
            strategy = %strategy,
            sharpe = %report.sharpe_ratio,
            win_rate = %report.win_rate,
            "backtest complete"
        );
        self.storage
            .next(
                StrategyKey {
                    symbol: symbol.clone(),
                    timeframe,
                    strategy: strategy.clone(),
                },
                vector,
            )
            .await;

        Ok(())
    }

    /// OPTIMIZE: regenerate if nothing cleared the cluster threshold,
    /// otherwise step the optimizer once and either declare convergence
    /// or loop back to BACKTEST with the refreshed population
    /// (`System._run_optimization`).
    async fn run_optimization(&mut self) -> Result<Option<SupervisorEvent>, SupervisorError> {
        let top = self.storage.get_top(self.config.active_strategy_num, true).await;
        if top.is_empty() {
            info!("no strategies above cluster threshold, regenerating population");
            return Ok(Some(SupervisorEvent::Regenerate));
        }

        let mut generator = self.generator.lock().await;
        if generator.optimize().await {
            info!("optimization complete");
            Ok(Some(SupervisorEvent::OptimizationComplete))
        } else {
            Ok(Some(SupervisorEvent::RunBacktest))
        }
    }

    /// TRADING: promote the top-ranked strategies to live (or paper, per
    /// `config.is_live`) squads and subscribe the websocket to their
    /// pairs (`System._run_trading`). There is no automatic follow-up
    /// event — TRADING only ends via `TradingStopped`/`SystemStop`.
    async fn run_trading(&mut self) -> Result<(), SupervisorError> {
        let top = self.storage.get_top(self.config.active_strategy_num, true).await;
        info!(count = top.len(), "promoting strategies to trading");

        for key in &top {
            self.adapter
                .update_symbol_settings(&key.symbol, PositionMode::OneWay, MarginMode::Isolated, self.config.leverage)
                .await?;

            let rng = StdRng::seed_from_u64(self.seed());
            let mode = if self.config.is_live {
                ExecutionMode::Live(self.adapter.clone())
            } else {
                ExecutionMode::Paper
            };
            let squad = Squad::new(
                key.symbol.clone(),
                key.timeframe,
                key.strategy.clone(),
                self.config.default_size,
                rng,
                self.generator.clone(),
                mode,
                self.bus.clone(),
            );
            squad.start().await;
            self.squads.push(squad);
        }

        let pairs: Vec<(Symbol, Timeframe)> = top.into_iter().map(|k| (k.symbol, k.timeframe)).collect();
        self.websocket.subscribe(pairs).await?;

        Ok(())
    }
}

/// A cheap, cloneable remote control for requesting a graceful stop
/// (`System.stop`). Separate from `Supervisor` itself since `run` consumes
/// the supervisor by value.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<SupervisorEvent>,
}

impl SupervisorHandle {
    pub async fn stop(&self) {
        let _ = self.tx.send(SupervisorEvent::SystemStop).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{DatasourceError, WebsocketError};
    use async_trait::async_trait;
    use ember_bus::BusConfig;
    use ember_execution::{BrokerPosition, BrokerTrade, ExecutionError, OrderId};
    use ember_instrument::Ohlcv;
    use ember_strategy::{PerformanceReport, PerformanceVector, StrategyDecision};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn symbol(name: &str) -> Symbol {
        Symbol::try_new(name, dec!(0.001), 3, 2, dec!(0.0006), dec!(0.0002)).unwrap()
    }

    struct NoopAdapter;

    #[async_trait]
    impl ExchangeAdapter for NoopAdapter {
        async fn fetch_future_symbols(&self) -> Result<Vec<Symbol>, ExecutionError> {
            Ok(vec![])
        }
        async fn fetch_account_balance(&self, _currency: &str) -> Result<Decimal, ExecutionError> {
            Ok(Decimal::ZERO)
        }
        async fn fetch_position(
            &self,
            _symbol: &Symbol,
            _side: ember_instrument::PositionSide,
        ) -> Result<Option<BrokerPosition>, ExecutionError> {
            Ok(None)
        }
        async fn fetch_trade(&self, _symbol: &Symbol) -> Result<Option<BrokerTrade>, ExecutionError> {
            Ok(None)
        }
        async fn create_limit_order(
            &self,
            _symbol: &Symbol,
            _side: ember_instrument::PositionSide,
            _size: Decimal,
            _price: Decimal,
        ) -> Result<OrderId, ExecutionError> {
            Ok(OrderId("order-1".into()))
        }
        async fn has_order(&self, _order_id: &OrderId, _symbol: &Symbol) -> Result<bool, ExecutionError> {
            Ok(true)
        }
        async fn close_position(&self, _symbol: &Symbol, _side: ember_instrument::PositionSide) -> Result<(), ExecutionError> {
            Ok(())
        }
        async fn update_symbol_settings(
            &self,
            _symbol: &Symbol,
            _position_mode: PositionMode,
            _margin_mode: MarginMode,
            _leverage: u32,
        ) -> Result<(), ExecutionError> {
            Ok(())
        }
        async fn fetch_ohlcv(
            &self,
            _symbol: &Symbol,
            _timeframe: Timeframe,
            _since_ms: i64,
            _limit: u32,
        ) -> Result<Vec<Ohlcv>, ExecutionError> {
            Ok(vec![])
        }
    }

    struct FixedDatasource(Vec<Ohlcv>);

    #[async_trait]
    impl Datasource for FixedDatasource {
        async fn fetch_ohlcv(
            &self,
            _symbol: &Symbol,
            _timeframe: Timeframe,
            _lookback_bars: u32,
        ) -> Result<Vec<Ohlcv>, DatasourceError> {
            Ok(self.0.clone())
        }
    }

    struct RecordingWebsocket {
        subscribed: Arc<StdMutex<Vec<(Symbol, Timeframe)>>>,
    }

    #[async_trait]
    impl WebsocketFeed for RecordingWebsocket {
        async fn subscribe(&self, pairs: Vec<(Symbol, Timeframe)>) -> Result<(), WebsocketError> {
            self.subscribed.lock().unwrap().extend(pairs);
            Ok(())
        }
    }

    /// A generator with one candidate that never raises a signal (keeps
    /// the backtest's closed-position set empty, which still satisfies
    /// `positive_pnl` since `NeutralAnalytics` below always reports a
    /// positive net PnL coordinate).
    struct OneShotGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StrategyGenerator for OneShotGenerator {
        async fn generate(&mut self, symbols: &[Symbol], timeframes: &[Timeframe]) -> Vec<(Symbol, Timeframe, Strategy)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            vec![(symbols[0].clone(), timeframes[0], Strategy::new("s1"))]
        }
        async fn optimize(&mut self) -> bool {
            true
        }
        async fn signal(
            &self,
            _strategy: &Strategy,
            _symbol: &Symbol,
            _timeframe: Timeframe,
            _bar: &Ohlcv,
        ) -> Option<StrategyDecision> {
            None
        }
    }

    struct NeutralAnalytics;

    #[async_trait]
    impl PerformanceAnalytics for NeutralAnalytics {
        async fn evaluate(&self, _closed_positions: &[Position]) -> (PerformanceVector, PerformanceReport) {
            (PerformanceVector::new(vec![dec!(1.0), dec!(1.0)]), PerformanceReport::default())
        }
    }

    fn bars() -> Vec<Ohlcv> {
        vec![
            Ohlcv::try_new(0, dec!(100), dec!(100.5), dec!(99.5), dec!(100), dec!(1)).unwrap(),
            Ohlcv::try_new(60_000, dec!(100), dec!(100.5), dec!(99.5), dec!(100), dec!(1)).unwrap(),
        ]
    }

    /// End-to-end: one candidate, a generator that converges immediately,
    /// and a `positive_pnl`-passing analytics result should drive the
    /// supervisor all the way from INIT through TRADING, subscribing the
    /// websocket to the promoted pair.
    #[tokio::test]
    async fn reaches_trading_and_subscribes_selected_pairs() {
        let bus = EventBus::handle(BusConfig::default());
        let subscribed = Arc::new(StdMutex::new(Vec::new()));
        let generator: Arc<AsyncMutex<Box<dyn StrategyGenerator>>> =
            Arc::new(AsyncMutex::new(Box::new(OneShotGenerator { calls: AtomicUsize::new(0) })));

        let supervisor = Supervisor::new(
            vec![symbol("BTCUSDT")],
            vec![Timeframe::M1],
            generator,
            Arc::new(NeutralAnalytics),
            Arc::new(FixedDatasource(bars())),
            Arc::new(RecordingWebsocket { subscribed: subscribed.clone() }),
            Arc::new(NoopAdapter),
            bus,
            crate::config::SupervisorConfig {
                active_strategy_num: 5,
                lookback_bars: 10,
                default_size: dec!(1),
                leverage: 1,
                is_live: false,
            },
        );
        let handle = supervisor.handle();

        let run = tokio::spawn(supervisor.run());
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        assert_eq!(subscribed.lock().unwrap().len(), 1);
        assert_eq!(subscribed.lock().unwrap()[0].0.name.as_str(), "BTCUSDT");

        handle.stop().await;
        let _ = tokio::time::timeout(std::time::Duration::from_secs(1), run).await;
    }
}
