//! Smart order router (C6): TWAP entry slicing, order-risk breach guard,
//! broker command/query pass-through (§4.6). Grounded in `sor/_router.py`.

use crate::config::{RouterConfig, BREACH_SLEEP_SECS};
use crate::error::RouterError;
use crate::events::{ClosePosition, GetBalance, GetSymbol, GetSymbols, OpenPosition};
use crate::exchange::{closing_side, ExchangeAdapter};
use ember_bus::{EventBus, HandlerError};
use ember_instrument::{PositionSide, Symbol};
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Registers the router's command/query handlers on `bus`. There is one
/// router per process (it owns no per-squad state); `config` and `adapter`
/// are shared across every `OpenPosition`/`ClosePosition` it handles.
pub fn register<R>(bus: &EventBus, adapter: Arc<dyn ExchangeAdapter>, config: RouterConfig, rng: R)
where
    R: Rng + Clone + Send + Sync + 'static,
{
    let open_adapter = adapter.clone();
    let open_rng = rng.clone();
    bus.register_command::<OpenPosition, _, _>(None, move |cmd| {
        let adapter = open_adapter.clone();
        let rng = open_rng.clone();
        let config = config;
        async move {
            open_position(
                adapter.as_ref(),
                config,
                rng,
                &cmd.symbol,
                cmd.side,
                cmd.desired_size,
                cmd.desired_entry,
                cmd.stop_loss,
            )
            .await
            .map_err(|err| HandlerError::new(err.to_string()))
        }
    });

    let close_adapter = adapter.clone();
    bus.register_command::<ClosePosition, _, _>(None, move |cmd| {
        let adapter = close_adapter.clone();
        async move {
            adapter
                .close_position(&cmd.symbol, closing_side(cmd.side))
                .await
                .map_err(|err| HandlerError::new(err.to_string()))
        }
    });

    let symbols_adapter = adapter.clone();
    bus.register_query::<GetSymbols, _, _>(move |_query| {
        let adapter = symbols_adapter.clone();
        async move {
            adapter
                .fetch_future_symbols()
                .await
                .map_err(|err| HandlerError::new(err.to_string()))
        }
    });

    let symbol_adapter = adapter.clone();
    bus.register_query::<GetSymbol, _, _>(move |query| {
        let adapter = symbol_adapter.clone();
        async move {
            let symbols = adapter
                .fetch_future_symbols()
                .await
                .map_err(|err| HandlerError::new(err.to_string()))?;
            Ok(symbols.into_iter().find(|s| s.name.as_str() == query.name))
        }
    });

    bus.register_query::<GetBalance, _, _>(move |query| {
        let adapter = adapter.clone();
        async move {
            adapter
                .fetch_account_balance(&query.currency)
                .await
                .map_err(|err| HandlerError::new(err.to_string()))
        }
    });
}

/// The chunk-slicing/breach-counting algorithm (§4.6): slice `desired_size`
/// into `N = min(max(1, size/min_size), max_order_slice)` chunks, sample a
/// TWAP reference price per chunk, skip (and count as a breach) any chunk
/// whose price is too close to the stop-loss, and abort once either the
/// breach counter or the attempt counter reaches its configured limit.
#[allow(clippy::too_many_arguments)]
pub async fn open_position<R: Rng>(
    adapter: &dyn ExchangeAdapter,
    config: RouterConfig,
    mut rng: R,
    symbol: &Symbol,
    side: PositionSide,
    desired_size: Decimal,
    desired_entry: Decimal,
    stop_loss: Decimal,
) -> Result<(), RouterError> {
    let chunk_count = crate::twap::chunk_count(desired_size, symbol.min_position_size, config.max_order_slice);
    let chunk_sizes = crate::twap::slice_quantities(desired_size, chunk_count, &mut rng);
    let risk_distance = (stop_loss - desired_entry).abs();

    let mut breaches: u32 = 0;
    let mut attempts: u32 = 0;
    let mut twap = crate::twap::TwapPriceStream::new(desired_entry, risk_distance, rng);
    open_position_with_twap(
        adapter,
        config,
        symbol,
        side,
        stop_loss,
        risk_distance,
        chunk_sizes,
        &mut twap,
        &mut breaches,
        &mut attempts,
    )
    .await
}

/// Same algorithm as [`open_position`] but takes an already-constructed
/// [`crate::twap::TwapSource`], letting tests inject a literal price
/// sequence (S5) instead of the randomised jitter stream.
#[allow(clippy::too_many_arguments)]
pub async fn open_position_with_twap(
    adapter: &dyn ExchangeAdapter,
    config: RouterConfig,
    symbol: &Symbol,
    side: PositionSide,
    stop_loss: Decimal,
    risk_distance: Decimal,
    chunk_sizes: Vec<Decimal>,
    twap: &mut dyn crate::twap::TwapSource,
    breaches: &mut u32,
    attempts: &mut u32,
) -> Result<(), RouterError> {

    for chunk_size in chunk_sizes {
        if *breaches >= config.max_order_breach {
            return Err(RouterError::BreachLimitReached {
                symbol: symbol.clone(),
                breaches: *breaches,
            });
        }
        if *attempts >= config.max_open_order_attempts {
            return Err(RouterError::AttemptLimitReached {
                symbol: symbol.clone(),
                attempts: *attempts,
            });
        }

        let price = twap.next_price();
        let breach = (stop_loss - price).abs() < config.stop_loss_threshold * risk_distance;

        if breach {
            *breaches += 1;
            *attempts += 1;
            warn!(symbol = %symbol.name, price = %price, "SOR chunk skipped: stop-loss-threshold breach");
            tokio::time::sleep(Duration::from_secs(BREACH_SLEEP_SECS)).await;
            continue;
        }

        match adapter.create_limit_order(symbol, side, chunk_size, price).await {
            Ok(_order_id) => {
                info!(symbol = %symbol.name, size = %chunk_size, price = %price, "SOR chunk placed");
                *attempts = attempts.saturating_sub(1);
            }
            Err(err) => {
                *attempts += 1;
                warn!(symbol = %symbol.name, error = %err, "SOR chunk placement failed");
            }
        }

        tokio::time::sleep(Duration::from_secs(config.entry_timeout_secs)).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{BrokerPosition, BrokerTrade, MarginMode, OrderId, PositionMode};
    use async_trait::async_trait;
    use ember_instrument::Timeframe;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct BreachingAdapter {
        placed: AtomicU32,
    }

    #[async_trait]
    impl ExchangeAdapter for BreachingAdapter {
        async fn fetch_future_symbols(&self) -> Result<Vec<Symbol>, crate::error::ExecutionError> {
            Ok(vec![])
        }
        async fn fetch_account_balance(&self, _currency: &str) -> Result<Decimal, crate::error::ExecutionError> {
            Ok(Decimal::ZERO)
        }
        async fn fetch_position(
            &self,
            _symbol: &Symbol,
            _side: PositionSide,
        ) -> Result<Option<BrokerPosition>, crate::error::ExecutionError> {
            Ok(None)
        }
        async fn fetch_trade(&self, _symbol: &Symbol) -> Result<Option<BrokerTrade>, crate::error::ExecutionError> {
            Ok(None)
        }
        async fn create_limit_order(
            &self,
            _symbol: &Symbol,
            _side: PositionSide,
            _size: Decimal,
            _price: Decimal,
        ) -> Result<OrderId, crate::error::ExecutionError> {
            self.placed.fetch_add(1, Ordering::SeqCst);
            Ok(OrderId("order-1".into()))
        }
        async fn has_order(&self, _order_id: &OrderId, _symbol: &Symbol) -> Result<bool, crate::error::ExecutionError> {
            Ok(true)
        }
        async fn close_position(&self, _symbol: &Symbol, _side: PositionSide) -> Result<(), crate::error::ExecutionError> {
            Ok(())
        }
        async fn update_symbol_settings(
            &self,
            _symbol: &Symbol,
            _position_mode: PositionMode,
            _margin_mode: MarginMode,
            _leverage: u32,
        ) -> Result<(), crate::error::ExecutionError> {
            Ok(())
        }
        async fn fetch_ohlcv(
            &self,
            _symbol: &Symbol,
            _timeframe: Timeframe,
            _since_ms: i64,
            _limit: u32,
        ) -> Result<Vec<ember_instrument::Ohlcv>, crate::error::ExecutionError> {
            Ok(vec![])
        }
    }

    fn symbol() -> Symbol {
        Symbol::try_new("BTCUSDT", dec!(0.001), 3, 2, dec!(0.0006), dec!(0.0002)).unwrap()
    }

    /// S5 — SOR risk-breach abort: desired entry=100, SL=99, threshold=0.5.
    /// TWAP offers 99.4, 99.3, 99.2 — each within `0.5 * |SL-entry| = 0.5`
    /// of the stop-loss, so after 3 breaches (max_order_breach=3) the
    /// router aborts without placing any order.
    #[tokio::test(start_paused = true)]
    async fn aborts_after_max_breaches_without_placing_orders() {
        let adapter = BreachingAdapter {
            placed: AtomicU32::new(0),
        };
        let config = RouterConfig {
            entry_timeout_secs: 0,
            stop_loss_threshold: dec!(0.5),
            max_order_slice: 5,
            max_order_breach: 3,
            max_open_order_attempts: 10,
        };
        let mut twap = crate::twap::FixedTwapSource::new(vec![dec!(99.4), dec!(99.3), dec!(99.2)]);
        let mut breaches = 0;
        let mut attempts = 0;
        let result = open_position_with_twap(
            &adapter,
            config,
            &symbol(),
            PositionSide::Long,
            dec!(99),
            dec!(1),
            vec![dec!(1), dec!(1), dec!(1), dec!(1), dec!(1)],
            &mut twap,
            &mut breaches,
            &mut attempts,
        )
        .await;

        assert!(matches!(result, Err(RouterError::BreachLimitReached { .. })));
        assert_eq!(adapter.placed.load(Ordering::SeqCst), 0);
    }
}
