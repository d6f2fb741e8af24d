//! The exchange adapter contract (§6), the narrow inbound interface the
//! live executor and smart order router call through. Concrete
//! implementations (REST/WebSocket clients) are out of scope (C9); this
//! crate only defines the seam and the retry policy that wraps it.

use ember_instrument::{Ohlcv, PositionSide, Symbol, Timeframe};
use rust_decimal::Decimal;
use std::time::Duration;

/// A broker's view of a currently open position, as returned by
/// `fetch_position` (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerPosition {
    pub entry_price: Decimal,
    pub position_size: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

/// The last traded price/size for a symbol, as returned by `fetch_trade`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerTrade {
    pub price: Decimal,
    pub amount: Decimal,
}

/// Position-mode/margin-mode settings pushed via `update_symbol_settings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionMode {
    OneWay,
    Hedge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginMode {
    Cross,
    Isolated,
}

/// Opaque broker order identifier returned by `create_limit_order`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(pub String);

/// Inbound contract the core consumes from the exchange (§6). Every method
/// the core genuinely calls for execution/routing purposes lives here;
/// network/auth/serialisation details are the concrete adapter's problem.
#[async_trait::async_trait]
pub trait ExchangeAdapter: Send + Sync {
    async fn fetch_future_symbols(&self) -> Result<Vec<Symbol>, crate::error::ExecutionError>;

    async fn fetch_account_balance(
        &self,
        currency: &str,
    ) -> Result<Decimal, crate::error::ExecutionError>;

    async fn fetch_position(
        &self,
        symbol: &Symbol,
        side: PositionSide,
    ) -> Result<Option<BrokerPosition>, crate::error::ExecutionError>;

    async fn fetch_trade(
        &self,
        symbol: &Symbol,
    ) -> Result<Option<BrokerTrade>, crate::error::ExecutionError>;

    async fn create_limit_order(
        &self,
        symbol: &Symbol,
        side: PositionSide,
        size: Decimal,
        price: Decimal,
    ) -> Result<OrderId, crate::error::ExecutionError>;

    async fn has_order(
        &self,
        order_id: &OrderId,
        symbol: &Symbol,
    ) -> Result<bool, crate::error::ExecutionError>;

    async fn close_position(
        &self,
        symbol: &Symbol,
        side: PositionSide,
    ) -> Result<(), crate::error::ExecutionError>;

    async fn update_symbol_settings(
        &self,
        symbol: &Symbol,
        position_mode: PositionMode,
        margin_mode: MarginMode,
        leverage: u32,
    ) -> Result<(), crate::error::ExecutionError>;

    async fn fetch_ohlcv(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        since_ms: i64,
        limit: u32,
    ) -> Result<Vec<Ohlcv>, crate::error::ExecutionError>;
}

/// `'sell' if LONG else 'buy'` (§9 Open Question #2): the side a
/// `close_position` call submits to flatten the given position side,
/// one-way position mode only.
pub fn closing_side(side: PositionSide) -> PositionSide {
    match side {
        PositionSide::Long => PositionSide::Short,
        PositionSide::Short => PositionSide::Long,
    }
}

/// Retry `op` up to 7 attempts with exponential backoff starting at 3s
/// (§6 "retry on transient failures (≤ 7 attempts, exponential backoff
/// starting at 3 s)"). Only the adapter retries; the core itself never
/// retries business logic (§9).
pub async fn fetch_ohlcv_with_retry<F, Fut>(
    mut attempt: F,
) -> Result<Vec<Ohlcv>, crate::error::ExecutionError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Vec<Ohlcv>, crate::error::ExecutionError>>,
{
    const MAX_ATTEMPTS: u32 = 7;
    const INITIAL_BACKOFF: Duration = Duration::from_secs(3);

    let mut backoff = INITIAL_BACKOFF;
    let mut last_err = None;
    for attempt_no in 1..=MAX_ATTEMPTS {
        match attempt().await {
            Ok(bars) => return Ok(bars),
            Err(crate::error::ExecutionError::TransientNetwork(msg)) => {
                tracing::warn!(attempt = attempt_no, error = %msg, "fetch_ohlcv transient failure, retrying");
                last_err = Some(crate::error::ExecutionError::TransientNetwork(msg));
                if attempt_no < MAX_ATTEMPTS {
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
            Err(other) => return Err(other),
        }
    }
    Err(crate::error::ExecutionError::Unavailable(
        last_err.map(|e| e.to_string()).unwrap_or_default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn closing_side_is_opposite() {
        assert_eq!(closing_side(PositionSide::Long), PositionSide::Short);
        assert_eq!(closing_side(PositionSide::Short), PositionSide::Long);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();
        let result = fetch_ohlcv_with_retry(|| {
            let counted = counted.clone();
            async move {
                let n = counted.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(crate::error::ExecutionError::TransientNetwork("timeout".into()))
                } else {
                    Ok(vec![])
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_seven_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();
        let result = fetch_ohlcv_with_retry(|| {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Err(crate::error::ExecutionError::TransientNetwork("down".into()))
            }
        })
        .await;
        assert!(matches!(result, Err(crate::error::ExecutionError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 7);
    }
}
