use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Supervisor-level configuration (§4.8, §6): population sizing, the
/// lookback window fed to BACKTEST, and the live-trading knobs applied
/// once a squad is promoted to TRADING.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SupervisorConfig {
    /// How many top-ranked `StrategyStorage` entries advance past
    /// OPTIMIZE into TRADING (`GetTopStrategy(num=...)` in the source).
    pub active_strategy_num: usize,
    /// Historical bars requested per `(symbol, timeframe)` during
    /// BACKTEST.
    pub lookback_bars: u32,
    /// Position size every squad's `DefaultPositionFactory` uses.
    pub default_size: Decimal,
    pub leverage: u32,
    /// Whether TRADING places live orders (`MARKET`) or keeps paper-filling
    /// (`PAPER`), matching `System._run_trading`'s `is_live` switch.
    pub is_live: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            active_strategy_num: 5,
            lookback_bars: 500,
            default_size: Decimal::ONE,
            leverage: 1,
            is_live: false,
        }
    }
}
