//! Core instrument data model shared by every Ember crate.
//!
//! This crate deliberately knows nothing about events, actors or execution —
//! it only defines the immutable value types (`Symbol`, `Timeframe`, `Ohlcv`,
//! `Side`) that the rest of the engine is built from.

pub mod ohlcv;
pub mod side;
pub mod symbol;
pub mod timeframe;

pub use ohlcv::Ohlcv;
pub use side::{PositionSide, SignalSide};
pub use symbol::Symbol;
pub use timeframe::Timeframe;
