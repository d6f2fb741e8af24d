//! No-op stand-ins for the C9 collaborator seams, used only by `main` to
//! make this binary runnable standalone. None of these talk to a real
//! exchange; swap them for concrete adapters to go live.

use async_trait::async_trait;
use ember::collaborators::{Datasource, ExchangeAdapter, PerformanceAnalytics, StrategyGenerator, WebsocketFeed};
use ember_execution::{BrokerPosition, BrokerTrade, ExecutionError, MarginMode, OrderId, PositionMode};
use ember_instrument::{Ohlcv, PositionSide, Symbol, Timeframe};
use ember_position::Position;
use ember_strategy::{PerformanceReport, PerformanceVector, StrategyDecision};
use ember_supervisor::{DatasourceError, WebsocketError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub fn btcusdt() -> Symbol {
    Symbol::try_new("BTCUSDT", dec!(0.001), 3, 2, dec!(0.0006), dec!(0.0002))
        .expect("demo symbol constants are valid")
}

/// Generates nothing and never advances past backtesting, so the demo
/// binary idles in a safe, order-free loop until `ctrl_c`.
pub struct NoopGenerator;

#[async_trait]
impl StrategyGenerator for NoopGenerator {
    async fn generate(&mut self, _symbols: &[Symbol], _timeframes: &[Timeframe]) -> Vec<(Symbol, Timeframe, ember_strategy::Strategy)> {
        Vec::new()
    }

    async fn optimize(&mut self) -> bool {
        true
    }

    async fn signal(
        &self,
        _strategy: &ember_strategy::Strategy,
        _symbol: &Symbol,
        _timeframe: Timeframe,
        _bar: &Ohlcv,
    ) -> Option<StrategyDecision> {
        None
    }
}

pub struct NoopAnalytics;

#[async_trait]
impl PerformanceAnalytics for NoopAnalytics {
    async fn evaluate(&self, _closed_positions: &[Position]) -> (PerformanceVector, PerformanceReport) {
        (PerformanceVector::new(vec![Decimal::ZERO, Decimal::ZERO]), PerformanceReport::default())
    }
}

pub struct NoopDatasource;

#[async_trait]
impl Datasource for NoopDatasource {
    async fn fetch_ohlcv(&self, _symbol: &Symbol, _timeframe: Timeframe, _lookback_bars: u32) -> Result<Vec<Ohlcv>, DatasourceError> {
        Ok(Vec::new())
    }
}

pub struct NoopWebsocket;

#[async_trait]
impl WebsocketFeed for NoopWebsocket {
    async fn subscribe(&self, _pairs: Vec<(Symbol, Timeframe)>) -> Result<(), WebsocketError> {
        Ok(())
    }
}

pub struct NoopAdapter;

#[async_trait]
impl ExchangeAdapter for NoopAdapter {
    async fn fetch_future_symbols(&self) -> Result<Vec<Symbol>, ExecutionError> {
        Ok(vec![btcusdt()])
    }

    async fn fetch_account_balance(&self, _currency: &str) -> Result<Decimal, ExecutionError> {
        Ok(Decimal::ZERO)
    }

    async fn fetch_position(&self, _symbol: &Symbol, _side: PositionSide) -> Result<Option<BrokerPosition>, ExecutionError> {
        Ok(None)
    }

    async fn fetch_trade(&self, _symbol: &Symbol) -> Result<Option<BrokerTrade>, ExecutionError> {
        Ok(None)
    }

    async fn create_limit_order(&self, _symbol: &Symbol, _side: PositionSide, _size: Decimal, _price: Decimal) -> Result<OrderId, ExecutionError> {
        Ok(OrderId("demo-order".to_string()))
    }

    async fn has_order(&self, _order_id: &OrderId, _symbol: &Symbol) -> Result<bool, ExecutionError> {
        Ok(false)
    }

    async fn close_position(&self, _symbol: &Symbol, _side: PositionSide) -> Result<(), ExecutionError> {
        Ok(())
    }

    async fn update_symbol_settings(&self, _symbol: &Symbol, _position_mode: PositionMode, _margin_mode: MarginMode, _leverage: u32) -> Result<(), ExecutionError> {
        Ok(())
    }

    async fn fetch_ohlcv(&self, _symbol: &Symbol, _timeframe: Timeframe, _since_ms: i64, _limit: u32) -> Result<Vec<Ohlcv>, ExecutionError> {
        Ok(Vec::new())
    }
}
