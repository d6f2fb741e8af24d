use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single candlestick bar. `timestamp` is milliseconds since the Unix
/// epoch, matching the websocket feed and broker adapter contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Ohlcv {
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OhlcvError {
    #[error("low ({low}) must be <= open ({open})")]
    LowAboveOpen { low: Decimal, open: Decimal },
    #[error("low ({low}) must be <= close ({close})")]
    LowAboveClose { low: Decimal, close: Decimal },
    #[error("open ({open}) must be <= high ({high})")]
    OpenAboveHigh { open: Decimal, high: Decimal },
    #[error("close ({close}) must be <= high ({high})")]
    CloseAboveHigh { close: Decimal, high: Decimal },
    #[error("low ({low}) must be <= high ({high})")]
    LowAboveHigh { low: Decimal, high: Decimal },
    #[error("volume must be >= 0, got {0}")]
    NegativeVolume(Decimal),
}

impl Ohlcv {
    /// Construct an `Ohlcv`, rejecting bars that violate the candle
    /// invariant (`low <= open,close <= high`, `low <= high`, `volume >= 0`).
    ///
    /// The upstream websocket/datasource adapters are out of scope, but this
    /// boundary check is not optional: a malformed bar would silently break
    /// the break-even ladder and risk-type assessment downstream.
    pub fn try_new(
        timestamp: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Result<Self, OhlcvError> {
        if low > open {
            return Err(OhlcvError::LowAboveOpen { low, open });
        }
        if low > close {
            return Err(OhlcvError::LowAboveClose { low, close });
        }
        if open > high {
            return Err(OhlcvError::OpenAboveHigh { open, high });
        }
        if close > high {
            return Err(OhlcvError::CloseAboveHigh { close, high });
        }
        if low > high {
            return Err(OhlcvError::LowAboveHigh { low, high });
        }
        if volume < Decimal::ZERO {
            return Err(OhlcvError::NegativeVolume(volume));
        }

        Ok(Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// `(high + low + close) / 3`, the reference "current price" used for
    /// display and unrealised PnL (§4.4).
    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }

    /// `true` if `|open - high| < |open - low|` — the bar leans toward the
    /// high first (`OHLC` intrabar path), used by the paper executor's
    /// fill-price policy (§4.5).
    pub fn leans_high_first(&self) -> bool {
        (self.open - self.high).abs() < (self.open - self.low).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejects_low_above_open() {
        let err = Ohlcv::try_new(0, dec!(10), dec!(20), dec!(15), dec!(12), dec!(1));
        assert!(matches!(err, Err(OhlcvError::LowAboveOpen { .. })));
    }

    #[test]
    fn accepts_valid_bar() {
        let bar = Ohlcv::try_new(0, dec!(10), dec!(20), dec!(5), dec!(15), dec!(1)).unwrap();
        assert_eq!(bar.typical_price(), (dec!(20) + dec!(5) + dec!(15)) / dec!(3));
    }

    #[test]
    fn intrabar_direction_follows_distance_to_open() {
        let ohlc = Ohlcv::try_new(0, dec!(10), dec!(12), dec!(5), dec!(11), dec!(1)).unwrap();
        assert!(ohlc.leans_high_first());

        let olhc = Ohlcv::try_new(0, dec!(10), dec!(11), dec!(2), dec!(9), dec!(1)).unwrap();
        assert!(!olhc.leans_high_first());
    }
}
