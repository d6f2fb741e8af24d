//! Root wiring crate (workspace crate table's "wiring" row): the
//! collaborator re-export surface, the aggregate config, the top-level
//! error, and (in `main.rs`) the binary that assembles an [`ember_bus::EventBus`]
//! and an [`ember_supervisor::Supervisor`] from them.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod logging;

pub use config::EmberConfig;
pub use error::Error;
