//! Position actor (C2 specialised for C3): owns the long/short FSM pair
//! for one `(symbol, timeframe, strategy)` squad. Grounded in
//! `position/_actor.py::PositionActor`.

use crate::events::{
    BacktestEnded, BrokerPositionClosed, BrokerPositionOpened, GoLongSignalReceived,
    GoShortSignalReceived, PositionClosed, PositionCloseRequested, PositionInitialized,
    PositionOpened, RiskThresholdBreached,
};
use crate::position::Position;
use crate::sm::{PositionFsm, PositionFsmOutput};
use async_trait::async_trait;
use ember_actor::Actor;
use ember_bus::{EventBus, GroupKey, Meta, MsgKey};
use ember_instrument::{PositionSide, Symbol, Timeframe};
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;

/// The converted message union this actor's `on_receive` dispatches on —
/// the Rust analogue of the Python `Union[SignalEvent, ExitSignal,
/// BrokerPositionEvent]` that `_actor.py` accepts.
#[derive(Debug, Clone)]
pub enum PositionMsg {
    Signal {
        side: PositionSide,
        signal: crate::signal::Signal,
        signal_risk: crate::signal::SignalRisk,
    },
    BrokerOpened(Position),
    BrokerClosed(Position),
    RiskBreach(Position, Decimal),
    BacktestEnded(Decimal),
}

fn group_key(symbol: &Symbol, timeframe: Timeframe) -> GroupKey {
    GroupKey::new(format!("{}:{}", symbol.name, timeframe))
}

/// Builds a [`Position`] from a received signal. A thin seam so the actor
/// doesn't need to know how the RNG or default sizing is sourced — the
/// squad factory supplies one of these per actor.
pub trait PositionFactory: Send + Sync {
    fn create_position(
        &mut self,
        signal: crate::signal::Signal,
        signal_risk: crate::signal::SignalRisk,
    ) -> Position;
}

/// Default factory: samples break-even factors from an injected RNG and
/// sizes every position at `default_size` (§9 "Random break-even factors
/// ... reproducible in tests via an injectable RNG").
pub struct DefaultPositionFactory<R: Rng + Send + Sync> {
    pub rng: R,
    pub default_size: Decimal,
}

impl<R: Rng + Send + Sync> PositionFactory for DefaultPositionFactory<R> {
    fn create_position(
        &mut self,
        signal: crate::signal::Signal,
        signal_risk: crate::signal::SignalRisk,
    ) -> Position {
        Position::new(&mut self.rng, self.default_size, signal, signal_risk)
    }
}

pub struct PositionActor<F: PositionFactory> {
    symbol: Symbol,
    timeframe: Timeframe,
    long: PositionFsm,
    short: PositionFsm,
    factory: F,
    bus: Arc<EventBus>,
}

impl<F: PositionFactory> PositionActor<F> {
    pub fn new(symbol: Symbol, timeframe: Timeframe, factory: F, bus: Arc<EventBus>) -> Self {
        Self {
            symbol,
            timeframe,
            long: PositionFsm::new(PositionSide::Long),
            short: PositionFsm::new(PositionSide::Short),
            factory,
            bus,
        }
    }

    fn matches(&self, symbol: &Symbol, timeframe: Timeframe) -> bool {
        self.symbol == *symbol && self.timeframe == timeframe
    }

    async fn emit(&self, out: PositionFsmOutput) {
        let group = group_key(&self.symbol, self.timeframe);
        // Every position lifecycle event shares one priority (§4 events.py
        // `PositionEvent.meta` default).
        let priority = crate::events::priority::POSITION;
        match out {
            PositionFsmOutput::Initialized(position) => {
                self.bus
                    .dispatch(PositionInitialized {
                        meta: Meta::new(priority, group, MsgKey::unique()),
                        position,
                    })
                    .await;
            }
            PositionFsmOutput::Opened(position) => {
                self.bus
                    .dispatch(PositionOpened {
                        meta: Meta::new(priority, group, MsgKey::unique()),
                        position,
                    })
                    .await;
            }
            PositionFsmOutput::CloseRequested(position, exit_price) => {
                self.bus
                    .dispatch(PositionCloseRequested {
                        meta: Meta::new(priority, group, MsgKey::unique()),
                        position,
                        exit_price,
                    })
                    .await;
            }
            PositionFsmOutput::Closed(position) => {
                self.bus
                    .dispatch(PositionClosed {
                        meta: Meta::new(priority, group, MsgKey::unique()),
                        position,
                    })
                    .await;
            }
        }
    }

    async fn handle_signal(&mut self, side: PositionSide, signal: crate::signal::Signal, signal_risk: crate::signal::SignalRisk) {
        let fsm = match side {
            PositionSide::Long => &mut self.long,
            PositionSide::Short => &mut self.short,
        };
        let factory = &mut self.factory;
        let out = fsm.handle_signal(|| factory.create_position(signal, signal_risk));
        if let Some(out) = out {
            self.emit(out).await;
        }
    }

    async fn handle_broker_opened(&mut self, position: Position) {
        let fsm = match position.side() {
            PositionSide::Long => &mut self.long,
            PositionSide::Short => &mut self.short,
        };
        if let Some(out) = fsm.handle_broker_opened(position) {
            self.emit(out).await;
        }
    }

    async fn emit_opt(&self, out: Option<PositionFsmOutput>) {
        if let Some(out) = out {
            self.emit(out).await;
        }
    }

    async fn handle_broker_closed(&mut self, position: Position) {
        // Shared across both FSMs: whichever side has a matching active
        // position consumes it (§9 "shared parts dispatched in parallel
        // using gather-style concurrency").
        let long_out = self.long.handle_broker_closed(position.clone());
        let short_out = self.short.handle_broker_closed(position);
        tokio::join!(self.emit_opt(long_out), self.emit_opt(short_out));
    }

    async fn handle_risk_breach(&mut self, position: Position, exit_price: Decimal) {
        let fsm = match position.side() {
            PositionSide::Long => &mut self.long,
            PositionSide::Short => &mut self.short,
        };
        if let Some(out) = fsm.handle_risk_breach(position, exit_price) {
            self.emit(out).await;
        }
    }

    async fn handle_backtest_ended(&mut self, exit_price: Decimal) {
        let long_out = self.long.handle_backtest_ended(exit_price);
        let short_out = self.short.handle_backtest_ended(exit_price);
        tokio::join!(self.emit_opt(long_out), self.emit_opt(short_out));
    }
}

#[async_trait]
impl<F: PositionFactory + 'static> Actor for PositionActor<F> {
    type Msg = PositionMsg;

    fn pre_receive(&self, msg: &Self::Msg) -> bool {
        match msg {
            PositionMsg::Signal { signal, .. } => self.matches(&signal.symbol, signal.timeframe),
            PositionMsg::BrokerOpened(position) | PositionMsg::BrokerClosed(position) => {
                self.matches(&position.signal.symbol, position.signal.timeframe)
            }
            PositionMsg::RiskBreach(position, _) => {
                self.matches(&position.signal.symbol, position.signal.timeframe)
            }
            // BacktestEnded is broadcast to every squad; each FSM's own
            // `Open` guard decides whether it applies.
            PositionMsg::BacktestEnded(_) => true,
        }
    }

    async fn on_receive(&mut self, msg: Self::Msg) {
        match msg {
            PositionMsg::Signal {
                side,
                signal,
                signal_risk,
            } => self.handle_signal(side, signal, signal_risk).await,
            PositionMsg::BrokerOpened(position) => self.handle_broker_opened(position).await,
            PositionMsg::BrokerClosed(position) => self.handle_broker_closed(position).await,
            PositionMsg::RiskBreach(position, exit_price) => {
                self.handle_risk_breach(position, exit_price).await
            }
            PositionMsg::BacktestEnded(exit_price) => self.handle_backtest_ended(exit_price).await,
        }
    }
}

/// Wires a [`PositionActor`] into the bus: one handler per wire event
/// type, each converting into [`PositionMsg`] before reaching the shared
/// actor. Mirrors `_actor.py::_EVENTS` — the declared subscription set.
pub fn subscribe<F: PositionFactory + 'static>(
    cell: &ember_actor::ActorCell<PositionActor<F>>,
    bus: &EventBus,
) {
    cell.subscribe_event::<GoLongSignalReceived, _>(bus, |payload| PositionMsg::Signal {
        side: PositionSide::Long,
        signal: payload.signal.clone(),
        signal_risk: payload.signal_risk,
    });
    cell.subscribe_event::<GoShortSignalReceived, _>(bus, |payload| PositionMsg::Signal {
        side: PositionSide::Short,
        signal: payload.signal.clone(),
        signal_risk: payload.signal_risk,
    });
    cell.subscribe_event::<BrokerPositionOpened, _>(bus, |payload| {
        PositionMsg::BrokerOpened(payload.position.clone())
    });
    cell.subscribe_event::<BrokerPositionClosed, _>(bus, |payload| {
        PositionMsg::BrokerClosed(payload.position.clone())
    });
    cell.subscribe_event::<RiskThresholdBreached, _>(bus, |payload| {
        PositionMsg::RiskBreach(payload.position.clone(), payload.exit_price)
    });
    cell.subscribe_event::<BacktestEnded, _>(bus, |payload| {
        PositionMsg::BacktestEnded(payload.exit_price)
    });
}
