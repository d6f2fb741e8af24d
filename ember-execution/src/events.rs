//! Bus wire types for the executor/router (C5, C6), mirroring
//! `ember_position::events`'s `bus_message!` convention.

use crate::exchange::BrokerPosition;
use ember_bus::{BusMessage, Meta, Query};
use ember_instrument::{PositionSide, Symbol};
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

/// Command the smart order router handles: slice `desired_size` into TWAP
/// chunks and attempt to place them (§4.6).
bus_message!(OpenPosition {
    symbol: Symbol,
    side: PositionSide,
    desired_size: Decimal,
    desired_entry: Decimal,
    stop_loss: Decimal,
});

/// Command the smart order router handles with a single market close
/// (§4.6).
bus_message!(ClosePosition {
    symbol: Symbol,
    side: PositionSide,
});

bus_message!(GetSymbols {});
impl Query for GetSymbols {
    type Response = Vec<Symbol>;
}

bus_message!(GetSymbol { name: String });
impl Query for GetSymbol {
    type Response = Option<Symbol>;
}

bus_message!(GetBalance { currency: String });
impl Query for GetBalance {
    type Response = Decimal;
}

/// The live executor's reconciliation query after requesting an entry:
/// translates the broker's acknowledged position into the `Option<BrokerPosition>`
/// contract (§4.5 "reconciles via GetOpenPosition/GetClosePosition queries").
bus_message!(GetOpenPosition {
    symbol: Symbol,
    side: PositionSide,
});
impl Query for GetOpenPosition {
    type Response = Option<BrokerPosition>;
}

bus_message!(GetClosePosition {
    symbol: Symbol,
    side: PositionSide,
});
impl Query for GetClosePosition {
    type Response = Option<BrokerPosition>;
}

/// Bus priority constants for the executor/router, mirroring
/// `ember_position::events::priority`.
pub mod priority {
    pub const EXECUTION: i32 = 3;
    pub const ROUTER: i32 = 3;
    pub const QUERY: i32 = 5;
}
