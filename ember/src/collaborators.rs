//! Collaborator seams (C9): every trait the core calls out to but does
//! not implement itself, gathered under one path so a concrete deployment
//! only has to `use ember::collaborators::*` to see the full surface it
//! needs to satisfy. Each trait's canonical definition lives in the crate
//! that actually calls through it (the router calls `ExchangeAdapter`, the
//! supervisor calls `Datasource`/`WebsocketFeed`, the squad factory calls
//! `StrategyGenerator`/`PerformanceAnalytics`) — re-exporting here avoids a
//! dependency cycle back into this crate while still giving collaborator
//! authors one place to look.

pub use ember_execution::ExchangeAdapter;
pub use ember_strategy::{PerformanceAnalytics, StrategyGenerator};
pub use ember_supervisor::{Datasource, WebsocketFeed};
