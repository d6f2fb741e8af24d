use ember_instrument::{Ohlcv, SignalSide, Symbol, Timeframe};
use rust_decimal::Decimal;

/// Exogenous risk classification a strategy/risk-scoring collaborator may
/// attach to a [`Signal`] (§3 Data Model). Carries an optional suggested
/// TP/SL the position factory may fold into its own risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalRiskType {
    None,
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalRisk {
    pub risk_type: SignalRiskType,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
}

impl SignalRisk {
    pub fn none() -> Self {
        Self {
            risk_type: SignalRiskType::None,
            take_profit: None,
            stop_loss: None,
        }
    }
}

/// A long/short trade idea produced by a strategy (§3 Data Model).
/// Identity is `(symbol, timeframe, strategy, ohlcv.timestamp, side)`; two
/// signals with the same identity are duplicates (§4.3 "duplicate signals
/// are dropped").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub strategy: String,
    pub side: SignalSide,
    pub entry: Decimal,
    pub stop_loss: Decimal,
    pub ohlcv: Ohlcv,
}

impl Signal {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        timeframe: Timeframe,
        strategy: impl Into<String>,
        side: SignalSide,
        entry: Decimal,
        stop_loss: Decimal,
        ohlcv: Ohlcv,
    ) -> Self {
        Self {
            symbol,
            timeframe,
            strategy: strategy.into(),
            side,
            entry,
            stop_loss,
            ohlcv,
        }
    }

    /// The deduplication identity per §3: `(symbol, timeframe, strategy,
    /// ohlcv.timestamp, side)`.
    pub fn identity(&self) -> (Symbol, Timeframe, String, i64, SignalSide) {
        (
            self.symbol.clone(),
            self.timeframe,
            self.strategy.clone(),
            self.ohlcv.timestamp,
            self.side,
        )
    }
}
