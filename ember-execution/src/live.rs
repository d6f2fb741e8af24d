//! Live executor (C5): wraps the same executor contract as
//! [`crate::paper`] but sends the order through the exchange and
//! reconciles via `GetOpenPosition`/`GetClosePosition` bus queries that
//! translate broker responses into [`Order`] records (§4.5).

use crate::error::ExecutionError;
use crate::events::{GetClosePosition, GetOpenPosition};
use crate::exchange::{closing_side, ExchangeAdapter};
use async_trait::async_trait;
use ember_actor::Actor;
use ember_bus::{EventBus, GroupKey, Meta, MsgKey};
use ember_instrument::{Symbol, Timeframe};
use ember_position::events::{
    BrokerPositionClosed, BrokerPositionOpened, PositionCloseRequested, PositionInitialized,
};
use ember_position::{Order, OrderKind, OrderStatus, Position};
use std::sync::Arc;
use tracing::error;

fn group_key(symbol: &Symbol, timeframe: Timeframe) -> GroupKey {
    GroupKey::new(format!("{}:{}", symbol.name, timeframe))
}

#[derive(Debug, Clone)]
pub enum LiveExecutorMsg {
    Open(Position),
    Close(Position),
}

/// Registers the bus query handlers a [`LiveExecutor`] relies on to
/// reconcile broker acknowledgements; call once per process with the
/// shared adapter before spawning any `LiveExecutor` actors.
pub fn register_reconciliation_queries(bus: &EventBus, adapter: Arc<dyn ExchangeAdapter>) {
    let open_adapter = adapter.clone();
    bus.register_query::<GetOpenPosition, _, _>(move |query| {
        let adapter = open_adapter.clone();
        async move { adapter.fetch_position(&query.symbol, query.side).await.map_err(to_handler_error) }
    });

    bus.register_query::<GetClosePosition, _, _>(move |query| {
        let adapter = adapter.clone();
        async move { adapter.fetch_position(&query.symbol, query.side).await.map_err(to_handler_error) }
    });
}

fn to_handler_error(err: ExecutionError) -> ember_bus::HandlerError {
    ember_bus::HandlerError::new(err.to_string())
}

/// Live order filler for one `(symbol, timeframe)` squad. Places the order
/// through [`ExchangeAdapter`], then reconciles via the bus queries
/// registered by [`register_reconciliation_queries`].
pub struct LiveExecutor {
    symbol: Symbol,
    timeframe: Timeframe,
    adapter: Arc<dyn ExchangeAdapter>,
    bus: Arc<EventBus>,
}

impl LiveExecutor {
    pub fn new(
        symbol: Symbol,
        timeframe: Timeframe,
        adapter: Arc<dyn ExchangeAdapter>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            symbol,
            timeframe,
            adapter,
            bus,
        }
    }

    fn matches(&self, symbol: &Symbol, timeframe: Timeframe) -> bool {
        self.symbol == *symbol && self.timeframe == timeframe
    }

    async fn handle_open(&mut self, position: Position) {
        let side = position.side();
        let size = self.symbol.round_size(position.initial_size);
        let price = self.symbol.round_price(position.signal.entry);

        let order_id = match self.adapter.create_limit_order(&self.symbol, side, size, price).await {
            Ok(id) => id,
            Err(err) => {
                error!(error = %err, symbol = %self.symbol.name, "broker rejected entry order");
                let failed = position.fill_order(Order::new(
                    OrderStatus::Failed,
                    OrderKind::Limit,
                    price,
                    rust_decimal::Decimal::ZERO,
                    rust_decimal::Decimal::ZERO,
                ));
                self.bus
                    .dispatch(BrokerPositionClosed {
                        meta: Meta::new(
                            ember_position::events::priority::POSITION,
                            group_key(&self.symbol, self.timeframe),
                            MsgKey::unique(),
                        ),
                        position: failed,
                    })
                    .await;
                return;
            }
        };
        let _ = order_id;

        let broker_position = self
            .bus
            .query(GetOpenPosition {
                meta: Meta::new(
                    ember_position::events::priority::POSITION,
                    group_key(&self.symbol, self.timeframe),
                    MsgKey::unique(),
                ),
                symbol: self.symbol.clone(),
                side,
            })
            .await;

        match broker_position {
            Ok(Some(broker)) => {
                let fee = broker.entry_price * broker.position_size * self.symbol.taker_fee;
                let filled = position.fill_order(Order::new(
                    OrderStatus::Executed,
                    OrderKind::Limit,
                    broker.entry_price,
                    broker.position_size,
                    fee,
                ));
                self.bus
                    .dispatch(BrokerPositionOpened {
                        meta: Meta::new(
                            ember_position::events::priority::POSITION,
                            group_key(&self.symbol, self.timeframe),
                            MsgKey::unique(),
                        ),
                        position: filled,
                    })
                    .await;
            }
            Ok(None) | Err(_) => {
                let failed = position.fill_order(Order::new(
                    OrderStatus::Failed,
                    OrderKind::Limit,
                    price,
                    rust_decimal::Decimal::ZERO,
                    rust_decimal::Decimal::ZERO,
                ));
                self.bus
                    .dispatch(BrokerPositionClosed {
                        meta: Meta::new(
                            ember_position::events::priority::POSITION,
                            group_key(&self.symbol, self.timeframe),
                            MsgKey::unique(),
                        ),
                        position: failed,
                    })
                    .await;
            }
        }
    }

    async fn handle_close(&mut self, position: Position) {
        let side = closing_side(position.side());
        if let Err(err) = self.adapter.close_position(&self.symbol, side).await {
            error!(error = %err, symbol = %self.symbol.name, "broker rejected close");
        }

        let broker_position = self
            .bus
            .query(GetClosePosition {
                meta: Meta::new(
                    ember_position::events::priority::POSITION,
                    group_key(&self.symbol, self.timeframe),
                    MsgKey::unique(),
                ),
                symbol: self.symbol.clone(),
                side: position.side(),
            })
            .await;

        let exit_price = match broker_position {
            Ok(Some(broker)) => broker.entry_price,
            _ => position.curr_price(),
        };
        let size = position.size();
        let fee = exit_price * size * self.symbol.taker_fee;
        let closed = position.fill_order(Order::new(
            OrderStatus::Closed,
            OrderKind::Limit,
            exit_price,
            size,
            fee,
        ));

        self.bus
            .dispatch(BrokerPositionClosed {
                meta: Meta::new(
                    ember_position::events::priority::POSITION,
                    group_key(&self.symbol, self.timeframe),
                    MsgKey::unique(),
                ),
                position: closed,
            })
            .await;
    }
}

#[async_trait]
impl Actor for LiveExecutor {
    type Msg = LiveExecutorMsg;

    fn pre_receive(&self, msg: &Self::Msg) -> bool {
        match msg {
            LiveExecutorMsg::Open(position) | LiveExecutorMsg::Close(position) => {
                self.matches(&position.signal.symbol, position.signal.timeframe)
            }
        }
    }

    async fn on_receive(&mut self, msg: Self::Msg) {
        match msg {
            LiveExecutorMsg::Open(position) => self.handle_open(position).await,
            LiveExecutorMsg::Close(position) => self.handle_close(position).await,
        }
    }
}

pub fn subscribe(cell: &ember_actor::ActorCell<LiveExecutor>, bus: &EventBus) {
    cell.subscribe_event::<PositionInitialized, _>(bus, |payload| {
        LiveExecutorMsg::Open(payload.position.clone())
    });
    cell.subscribe_event::<PositionCloseRequested, _>(bus, |payload| {
        LiveExecutorMsg::Close(payload.position.clone())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{BrokerTrade, MarginMode, OrderId};
    use ember_bus::BusConfig;
    use ember_instrument::{Ohlcv, SignalSide};
    use ember_position::{Signal, SignalRisk};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct RejectingAdapter;

    #[async_trait]
    impl ExchangeAdapter for RejectingAdapter {
        async fn fetch_future_symbols(&self) -> Result<Vec<Symbol>, ExecutionError> {
            Ok(vec![])
        }
        async fn fetch_account_balance(&self, _currency: &str) -> Result<Decimal, ExecutionError> {
            Ok(Decimal::ZERO)
        }
        async fn fetch_position(
            &self,
            _symbol: &Symbol,
            _side: PositionSide,
        ) -> Result<Option<crate::exchange::BrokerPosition>, ExecutionError> {
            Ok(None)
        }
        async fn fetch_trade(&self, _symbol: &Symbol) -> Result<Option<BrokerTrade>, ExecutionError> {
            Ok(None)
        }
        async fn create_limit_order(
            &self,
            symbol: &Symbol,
            _side: PositionSide,
            _size: Decimal,
            _price: Decimal,
        ) -> Result<OrderId, ExecutionError> {
            Err(ExecutionError::BrokerReject {
                symbol: symbol.clone(),
                reason: "insufficient margin".into(),
            })
        }
        async fn has_order(&self, _order_id: &OrderId, _symbol: &Symbol) -> Result<bool, ExecutionError> {
            Ok(false)
        }
        async fn close_position(&self, _symbol: &Symbol, _side: PositionSide) -> Result<(), ExecutionError> {
            Ok(())
        }
        async fn update_symbol_settings(
            &self,
            _symbol: &Symbol,
            _position_mode: crate::exchange::PositionMode,
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

    fn symbol() -> Symbol {
        Symbol::try_new("BTCUSDT", dec!(0.001), 3, 2, dec!(0.0006), dec!(0.0002)).unwrap()
    }

    /// A rejected broker order must surface as `BrokerPositionClosed` with
    /// zero size, the only wire event that drives `Opening -> Failed`
    /// (`ember_position::sm::PositionFsm::handle_broker_closed`) — not
    /// `BrokerPositionOpened`, which has no failure path and would instead
    /// ack the position into `Open`.
    #[tokio::test]
    async fn rejected_entry_dispatches_broker_position_closed_with_zero_size() {
        let bus = EventBus::handle(BusConfig::default());
        let seen_closed = Arc::new(AtomicBool::new(false));
        let closed_with_zero_size = Arc::new(AtomicBool::new(false));
        let flag = seen_closed.clone();
        let zero_size = closed_with_zero_size.clone();
        bus.register_event::<BrokerPositionClosed, _, _>(None, move |payload| {
            let flag = flag.clone();
            let zero_size = zero_size.clone();
            async move {
                flag.store(true, Ordering::SeqCst);
                zero_size.store(payload.position.size() == Decimal::ZERO, Ordering::SeqCst);
                Ok(())
            }
        });

        let mut executor = LiveExecutor::new(symbol(), Timeframe::M1, Arc::new(RejectingAdapter), bus.clone());

        let mut rng = StdRng::seed_from_u64(7);
        let signal_bar = Ohlcv::try_new(0, dec!(100), dec!(100), dec!(95), dec!(100), dec!(1)).unwrap();
        let signal = Signal::new(
            symbol(),
            Timeframe::M1,
            "ma-cross",
            SignalSide::Buy,
            dec!(100),
            dec!(95),
            signal_bar,
        );
        let position = Position::new(&mut rng, dec!(1), signal, SignalRisk::none());

        executor.handle_open(position).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(seen_closed.load(Ordering::SeqCst));
        assert!(closed_with_zero_size.load(Ordering::SeqCst));
    }
}
