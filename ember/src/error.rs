use thiserror::Error;

/// The binary-boundary error (§7 "composed upward into a top-level
/// `ember::Error` only at the binary boundary"). Every crate keeps its own
/// narrower error type for its own `Result`s; this one exists purely so
/// `main` has a single type to bubble failures up through.
///
/// `ember-position` carries no variant here: its FSMs use `Option`-returning
/// guards rather than a fallible API (an unapplicable event is a no-op, not
/// an error — see `ember-position::sm`), so it has nothing to compose.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Bus(#[from] ember_bus::BusError),

    #[error(transparent)]
    Execution(#[from] ember_execution::ExecutionError),

    #[error(transparent)]
    Router(#[from] ember_execution::RouterError),

    #[error(transparent)]
    Supervisor(#[from] ember_supervisor::SupervisorError),
}
