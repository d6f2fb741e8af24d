//! Bus wire types for the position/risk squad members (§3, §4.3, §4.4).
//! Grounded in `core/events/{position,risk,ohlcv}.py`: one struct per
//! concrete Python event subclass, each carrying the same [`Meta`]
//! priority/group pairing the source assigns via `EventMeta`.

use crate::position::Position;
use crate::signal::{Signal, SignalRisk};
use ember_bus::{BusMessage, Meta};
use ember_instrument::{Ohlcv, Symbol, Timeframe};
use rust_decimal::Decimal;

macro_rules! bus_message {
    ($name:ident { $($field:ident: $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            pub meta: Meta,
            $(pub $field: $ty,)*
        }

        impl BusMessage for $name {
            fn meta(&self) -> &Meta {
                &self.meta
            }
        }
    };
}

bus_message!(NewMarketDataReceived {
    symbol: Symbol,
    timeframe: Timeframe,
    ohlcv: Ohlcv,
    closed: bool,
});

bus_message!(GoLongSignalReceived {
    signal: Signal,
    signal_risk: SignalRisk,
});

bus_message!(GoShortSignalReceived {
    signal: Signal,
    signal_risk: SignalRisk,
});

bus_message!(PositionInitialized { position: Position });
bus_message!(PositionOpened { position: Position });
bus_message!(PositionCloseRequested {
    position: Position,
    exit_price: Decimal,
});
bus_message!(PositionClosed { position: Position });

bus_message!(BrokerPositionOpened { position: Position });
bus_message!(BrokerPositionClosed { position: Position });

bus_message!(RiskThresholdBreached {
    position: Position,
    exit_price: Decimal,
});

bus_message!(BacktestEnded { exit_price: Decimal });

/// Bus priority/group constants, mirroring `EventMeta` defaults in the
/// Python source's `core/events/*.py` (market=4, position=2, risk=1 —
/// lower value is more urgent, §4.1).
pub mod priority {
    pub const MARKET: i32 = 4;
    pub const POSITION: i32 = 2;
    pub const RISK: i32 = 1;
}
