//! System supervisor (C8): the generate -> backtest -> optimize -> trade
//! FSM, the squad factory it drives, and the fourth squad member (signal
//! actor) that closes the data-flow loop between market data and signals.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod fsm;
pub mod signal_actor;
pub mod squad;
pub mod supervisor;

pub use collaborators::{Datasource, DatasourceError, WebsocketError, WebsocketFeed};
pub use config::SupervisorConfig;
pub use error::SupervisorError;
pub use fsm::{SupervisorEvent, SupervisorState};
pub use squad::{ExecutionMode, Squad};
pub use supervisor::{Supervisor, SupervisorHandle};
