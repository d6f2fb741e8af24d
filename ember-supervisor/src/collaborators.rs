//! C9 seams the supervisor drives directly: historical bars for the
//! BACKTEST phase and websocket subscription for TRADING. Grounded in
//! `system/system.py`'s `datasource_factory`/`Subscribe` command — neither
//! has a concrete implementation here, only the narrow trait the FSM
//! calls through.

use async_trait::async_trait;
use ember_instrument::{Ohlcv, Symbol, Timeframe};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasourceError {
    #[error("transient failure fetching historical bars for {symbol}: {reason}")]
    TransientNetwork { symbol: Symbol, reason: String },
    #[error("datasource exhausted retries for {symbol}: {reason}")]
    Unavailable { symbol: Symbol, reason: String },
}

/// Historical OHLCV source for the BACKTEST phase (§4.8, §6
/// `fetch_ohlcv`). A concrete adapter would typically wrap the same
/// exchange adapter the live executor uses, but the supervisor only needs
/// this narrower seam.
#[async_trait]
pub trait Datasource: Send + Sync {
    async fn fetch_ohlcv(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        lookback_bars: u32,
    ) -> Result<Vec<Ohlcv>, DatasourceError>;
}

#[derive(Debug, Error)]
pub enum WebsocketError {
    #[error("failed to subscribe websocket feed: {0}")]
    Subscribe(String),
}

/// The live market-data feed the TRADING phase subscribes once strategies
/// are selected (§6 "subscribes to `kline.{interval}.{symbol}` topics").
#[async_trait]
pub trait WebsocketFeed: Send + Sync {
    async fn subscribe(&self, pairs: Vec<(Symbol, Timeframe)>) -> Result<(), WebsocketError>;
}
