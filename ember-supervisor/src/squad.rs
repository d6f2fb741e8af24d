//! Squad factory (§3 "a squad exclusively owns its four actors"):
//! constructs the signal/position/risk/executor quartet for one
//! `(symbol, timeframe, strategy)` triple and wires every one of them onto
//! the bus. Grounded in `system/squad.py::Squad` (`start`/`stop` fan out
//! to all four members via gather).

use crate::signal_actor::{self, SignalActor};
use ember_actor::ActorCell;
use ember_bus::EventBus;
use ember_execution::{LiveExecutor, PaperExecutor};
use ember_instrument::{Symbol, Timeframe};
use ember_position::actor::{self as position_actor, DefaultPositionFactory, PositionActor, PositionFactory};
use ember_position::risk_actor::{self, NoFloor, RiskActor};
use ember_strategy::{Strategy, StrategyGenerator};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Which executor a squad places orders through — `PAPER` during
/// GENERATE/BACKTEST/OPTIMIZE, `MARKET` (live) once TRADING, matching
/// `System._run_trading`'s `OrderType.MARKET if self.context.is_live else
/// OrderType.PAPER`.
pub enum ExecutorCell {
    Paper(ActorCell<PaperExecutor>),
    Live(ActorCell<LiveExecutor>),
}

impl ExecutorCell {
    async fn start(&self) {
        match self {
            ExecutorCell::Paper(cell) => cell.start().await,
            ExecutorCell::Live(cell) => cell.start().await,
        }
    }

    async fn stop(&self, bus: &EventBus) {
        match self {
            ExecutorCell::Paper(cell) => cell.stop(bus).await,
            ExecutorCell::Live(cell) => cell.stop(bus).await,
        }
    }
}

/// Where a squad's orders go once it starts trading.
pub enum ExecutionMode {
    Paper,
    Live(Arc<dyn ember_execution::ExchangeAdapter>),
}

/// Owns exactly one signal/position/risk/executor quartet for
/// `(symbol, timeframe, strategy)`. Dropping a `Squad` without calling
/// [`Squad::stop`] leaves its bus subscriptions registered — always pair
/// `start`/`stop`.
pub struct Squad {
    symbol: Symbol,
    timeframe: Timeframe,
    strategy: Strategy,
    signal: ActorCell<SignalActor>,
    position: ActorCell<PositionActor<DefaultPositionFactory<rand::rngs::StdRng>>>,
    risk: ActorCell<RiskActor<NoFloor>>,
    executor: ExecutorCell,
}

impl Squad {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        timeframe: Timeframe,
        strategy: Strategy,
        default_size: rust_decimal::Decimal,
        rng: rand::rngs::StdRng,
        generator: Arc<AsyncMutex<Box<dyn StrategyGenerator>>>,
        mode: ExecutionMode,
        bus: Arc<EventBus>,
    ) -> Self {
        let signal = ActorCell::new(SignalActor::new(
            symbol.clone(),
            timeframe,
            strategy.clone(),
            generator,
            bus.clone(),
        ));
        signal_actor::subscribe(&signal, &bus);

        let factory = DefaultPositionFactory { rng, default_size };
        let position = ActorCell::new(PositionActor::new(symbol.clone(), timeframe, factory, bus.clone()));
        position_actor::subscribe(&position, &bus);

        let risk = ActorCell::new(RiskActor::new(symbol.clone(), timeframe, bus.clone()));
        risk_actor::subscribe(&risk, &bus);

        let executor = match mode {
            ExecutionMode::Paper => {
                let cell = ActorCell::new(PaperExecutor::new(symbol.clone(), timeframe, bus.clone()));
                ember_execution::paper::subscribe(&cell, &bus);
                ExecutorCell::Paper(cell)
            }
            ExecutionMode::Live(adapter) => {
                let cell = ActorCell::new(LiveExecutor::new(symbol.clone(), timeframe, adapter, bus.clone()));
                ember_execution::live::subscribe(&cell, &bus);
                ExecutorCell::Live(cell)
            }
        };

        Self {
            symbol,
            timeframe,
            strategy,
            signal,
            position,
            risk,
            executor,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Runs every member's `start()` concurrently, mirroring
    /// `asyncio.gather(squad.start(), ..., order_executor.start())`.
    pub async fn start(&self) {
        tokio::join!(
            self.signal.start(),
            self.position.start(),
            self.risk.start(),
            self.executor.start(),
        );
    }

    pub async fn stop(&self, bus: &EventBus) {
        tokio::join!(
            self.signal.stop(bus),
            self.position.stop(bus),
            self.risk.stop(bus),
            self.executor.stop(bus),
        );
    }
}
