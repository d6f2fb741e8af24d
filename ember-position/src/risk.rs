use ember_instrument::{Ohlcv, PositionSide};
use rust_decimal::Decimal;

/// Classification produced by the risk component for each bar (§4.4,
/// GLOSSARY "Risk type").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionRiskType {
    None,
    TakeProfit,
    StopLoss,
    Expired,
}

/// A floor a technical-analysis collaborator may impose on the trailing
/// stop-loss, ratcheting it toward a recent swing low/high (§4.4 step 3).
/// The TA math itself is out of scope (C9); this crate only needs the
/// seam. [`NoFloor`] is the default when no TA collaborator is wired in.
pub trait StopLossFloor {
    fn floor(&self, side: PositionSide, bar: &Ohlcv, candidate_sl: Decimal) -> Decimal;
}

/// No-op floor: passes the candidate stop-loss through unchanged.
pub struct NoFloor;

impl StopLossFloor for NoFloor {
    fn floor(&self, _side: PositionSide, _bar: &Ohlcv, candidate_sl: Decimal) -> Decimal {
        candidate_sl
    }
}

/// Live risk state of an open position: the last bar it has seen and its
/// current classification (§3 Data Model, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRisk {
    pub last_bar: Ohlcv,
    pub risk_type: PositionRiskType,
}

impl PositionRisk {
    pub fn new(opening_bar: Ohlcv) -> Self {
        Self {
            last_bar: opening_bar,
            risk_type: PositionRiskType::None,
        }
    }

    /// Advance to a new bar. The caller (`Position::next`) is responsible
    /// for skipping bars that are not newer than `last_bar` (§4.4 step 0).
    pub fn advance(&self, bar: Ohlcv) -> Self {
        Self {
            last_bar: bar,
            ..*self
        }
    }

    /// Reassess risk type against `self.last_bar`'s `[low, high]`, in the
    /// order mandated by §4.4 step 4: expiration first, then SL-before-TP.
    pub fn assess(
        &self,
        side: PositionSide,
        take_profit: Decimal,
        stop_loss: Decimal,
        open_timestamp: i64,
        expiration_ms: i64,
    ) -> Self {
        let bar = self.last_bar;

        if bar.timestamp - open_timestamp >= expiration_ms {
            return Self {
                risk_type: PositionRiskType::Expired,
                ..*self
            };
        }

        let risk_type = match side {
            PositionSide::Long => {
                if bar.low <= stop_loss {
                    PositionRiskType::StopLoss
                } else if bar.high >= take_profit {
                    PositionRiskType::TakeProfit
                } else {
                    PositionRiskType::None
                }
            }
            PositionSide::Short => {
                if bar.high >= stop_loss {
                    PositionRiskType::StopLoss
                } else if bar.low <= take_profit {
                    PositionRiskType::TakeProfit
                } else {
                    PositionRiskType::None
                }
            }
        };

        Self { risk_type, ..*self }
    }

    /// The exit price to fill at, given the current classification: the
    /// bar's close on expiration, otherwise whichever of TP/SL was hit.
    pub fn exit_price(&self, side: PositionSide, take_profit: Decimal, stop_loss: Decimal) -> Decimal {
        match self.risk_type {
            PositionRiskType::Expired => self.last_bar.close,
            PositionRiskType::StopLoss => stop_loss,
            PositionRiskType::TakeProfit => take_profit,
            PositionRiskType::None => match side {
                PositionSide::Long => self.last_bar.close,
                PositionSide::Short => self.last_bar.close,
            },
        }
    }
}
