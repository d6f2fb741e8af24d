//! Executor (C5) and smart order router (C6): the paper and live order
//! fillers, the fill-price policy they share, and the TWAP-slicing router
//! that sits in front of the live broker.

pub mod config;
pub mod error;
pub mod events;
pub mod exchange;
pub mod fill;
pub mod live;
pub mod paper;
pub mod router;
pub mod twap;

pub use config::{RiskConfig, RouterConfig};
pub use error::{ExecutionError, RouterError};
pub use exchange::{BrokerPosition, BrokerTrade, ExchangeAdapter, MarginMode, OrderId, PositionMode};
pub use live::LiveExecutor;
pub use paper::PaperExecutor;
