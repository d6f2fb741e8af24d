//! Risk actor: tracks every open position for one squad and advances its
//! break-even ladder on each closed bar, emitting `RiskThresholdBreached`
//! when a position's risk type leaves `None` (§4.4). Grounded in the
//! `next()`/`break_even()` contract on `core/models/position.py`, wired
//! into the bus the way `position/_actor.py` wires `PositionActor`.

use crate::events::{NewMarketDataReceived, PositionClosed, PositionOpened, RiskThresholdBreached};
use crate::position::Position;
use crate::risk::{NoFloor, PositionRiskType, StopLossFloor};
use async_trait::async_trait;
use ember_actor::Actor;
use ember_bus::{EventBus, GroupKey, Meta, MsgKey};
use ember_instrument::{Ohlcv, PositionSide, Symbol, Timeframe};
use std::collections::HashMap;
use std::sync::Arc;

fn group_key(symbol: &Symbol, timeframe: Timeframe) -> GroupKey {
    GroupKey::new(format!("{}:{}", symbol.name, timeframe))
}

#[derive(Debug, Clone)]
pub enum RiskMsg {
    Bar { symbol: Symbol, timeframe: Timeframe, ohlcv: Ohlcv, closed: bool },
    Opened(Position),
    Closed(Position),
}

/// Tracks the open long/short positions for exactly one
/// `(symbol, timeframe)` squad and re-evaluates them every closed bar.
pub struct RiskActor<Floor: StopLossFloor + Send + Sync> {
    symbol: Symbol,
    timeframe: Timeframe,
    floor: Floor,
    open: HashMap<PositionSide, Position>,
    bus: Arc<EventBus>,
}

impl RiskActor<NoFloor> {
    pub fn new(symbol: Symbol, timeframe: Timeframe, bus: Arc<EventBus>) -> Self {
        Self::with_floor(symbol, timeframe, NoFloor, bus)
    }
}

impl<Floor: StopLossFloor + Send + Sync> RiskActor<Floor> {
    pub fn with_floor(symbol: Symbol, timeframe: Timeframe, floor: Floor, bus: Arc<EventBus>) -> Self {
        Self {
            symbol,
            timeframe,
            floor,
            open: HashMap::new(),
            bus,
        }
    }

    fn matches(&self, symbol: &Symbol, timeframe: Timeframe) -> bool {
        self.symbol == *symbol && self.timeframe == timeframe
    }

    async fn handle_bar(&mut self, ohlcv: Ohlcv, closed: bool) {
        // Only finalised bars advance the ladder; an in-progress candle is
        // not yet a trustworthy high/low for break-even math.
        if !closed {
            return;
        }

        let mut breached = Vec::new();
        for (side, position) in self.open.iter_mut() {
            let advanced = position.next(ohlcv, &self.floor);
            if advanced.risk_type() != PositionRiskType::None {
                let exit_price = advanced
                    .position_risk
                    .exit_price(*side, advanced.take_profit(), advanced.stop_loss());
                breached.push((advanced.clone(), exit_price));
            }
            *position = advanced;
        }

        for (position, exit_price) in breached {
            self.open.remove(&position.side());
            self.bus
                .dispatch(RiskThresholdBreached {
                    meta: Meta::new(
                        crate::events::priority::RISK,
                        group_key(&self.symbol, self.timeframe),
                        MsgKey::unique(),
                    ),
                    position,
                    exit_price,
                })
                .await;
        }
    }
}

#[async_trait]
impl<Floor: StopLossFloor + Send + Sync + 'static> Actor for RiskActor<Floor> {
    type Msg = RiskMsg;

    fn pre_receive(&self, msg: &Self::Msg) -> bool {
        match msg {
            RiskMsg::Bar { symbol, timeframe, .. } => self.matches(symbol, *timeframe),
            RiskMsg::Opened(position) | RiskMsg::Closed(position) => {
                self.matches(&position.signal.symbol, position.signal.timeframe)
            }
        }
    }

    async fn on_receive(&mut self, msg: Self::Msg) {
        match msg {
            RiskMsg::Bar { ohlcv, closed, .. } => self.handle_bar(ohlcv, closed).await,
            RiskMsg::Opened(position) => {
                self.open.insert(position.side(), position);
            }
            RiskMsg::Closed(position) => {
                self.open.remove(&position.side());
            }
        }
    }
}

pub fn subscribe<Floor: StopLossFloor + Send + Sync + 'static>(
    cell: &ember_actor::ActorCell<RiskActor<Floor>>,
    bus: &EventBus,
) {
    cell.subscribe_event::<NewMarketDataReceived, _>(bus, |payload| RiskMsg::Bar {
        symbol: payload.symbol.clone(),
        timeframe: payload.timeframe,
        ohlcv: payload.ohlcv,
        closed: payload.closed,
    });
    cell.subscribe_event::<PositionOpened, _>(bus, |payload| RiskMsg::Opened(payload.position.clone()));
    cell.subscribe_event::<PositionClosed, _>(bus, |payload| RiskMsg::Closed(payload.position.clone()));
}
