use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Side of an incoming [`Signal`](crate) — `BUY` opens a long, `SELL` opens a short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
pub enum SignalSide {
    Buy,
    Sell,
}

/// Side of an open [`Position`](crate), derived from the originating signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
pub enum PositionSide {
    Long,
    Short,
}

impl From<SignalSide> for PositionSide {
    fn from(side: SignalSide) -> Self {
        match side {
            SignalSide::Buy => PositionSide::Long,
            SignalSide::Sell => PositionSide::Short,
        }
    }
}

impl PositionSide {
    /// `1` for `Long`, `-1` for `Short` — the sign convention used throughout
    /// PnL and break-even ladder arithmetic.
    pub fn sign(&self) -> i64 {
        match self {
            PositionSide::Long => 1,
            PositionSide::Short => -1,
        }
    }
}
