use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Identity and precision/fee schedule for a tradeable future.
///
/// Construction is validated: `price_precision`/`position_precision` must be
/// non-negative and both fee rates must be non-negative, matching the
/// invariant in the data model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
#[display("{name}")]
pub struct Symbol {
    pub name: SmolStr,
    pub min_position_size: Decimal,
    pub position_precision: u32,
    pub price_precision: u32,
    pub taker_fee: Decimal,
    pub maker_fee: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("taker_fee must be >= 0, got {0}")]
    NegativeTakerFee(Decimal),
    #[error("maker_fee must be >= 0, got {0}")]
    NegativeMakerFee(Decimal),
    #[error("min_position_size must be >= 0, got {0}")]
    NegativeMinPositionSize(Decimal),
}

impl Symbol {
    pub fn try_new(
        name: impl Into<SmolStr>,
        min_position_size: Decimal,
        position_precision: u32,
        price_precision: u32,
        taker_fee: Decimal,
        maker_fee: Decimal,
    ) -> Result<Self, SymbolError> {
        if taker_fee < Decimal::ZERO {
            return Err(SymbolError::NegativeTakerFee(taker_fee));
        }
        if maker_fee < Decimal::ZERO {
            return Err(SymbolError::NegativeMakerFee(maker_fee));
        }
        if min_position_size < Decimal::ZERO {
            return Err(SymbolError::NegativeMinPositionSize(min_position_size));
        }

        Ok(Self {
            name: name.into(),
            min_position_size,
            position_precision,
            price_precision,
            taker_fee,
            maker_fee,
        })
    }

    /// Round a price to this symbol's `price_precision`.
    pub fn round_price(&self, price: Decimal) -> Decimal {
        price.round_dp(self.price_precision)
    }

    /// Round a position size to this symbol's `position_precision`.
    pub fn round_size(&self, size: Decimal) -> Decimal {
        size.round_dp(self.position_precision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc() -> Symbol {
        Symbol::try_new("BTCUSDT", dec!(0.001), 3, 2, dec!(0.0006), dec!(0.0002)).unwrap()
    }

    #[test]
    fn rejects_negative_fees() {
        assert!(Symbol::try_new("X", dec!(0), 0, 0, dec!(-0.1), dec!(0)).is_err());
        assert!(Symbol::try_new("X", dec!(0), 0, 0, dec!(0), dec!(-0.1)).is_err());
    }

    #[test]
    fn rounds_to_configured_precision() {
        let symbol = btc();
        assert_eq!(symbol.round_price(dec!(100.12345)), dec!(100.12));
        assert_eq!(symbol.round_size(dec!(0.12345)), dec!(0.123));
    }
}
