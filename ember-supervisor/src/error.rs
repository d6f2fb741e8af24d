use crate::collaborators::{DatasourceError, WebsocketError};
use thiserror::Error;

/// Errors a supervisor phase can fail with. Any of these halts the FSM
/// (§7 "everything recoverable is retried at the adapter; only shape/logic
/// errors propagate to handlers" — here the handler is the supervisor loop
/// itself, so a surfaced error is treated as fatal rather than retried).
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Datasource(#[from] DatasourceError),

    #[error(transparent)]
    Websocket(#[from] WebsocketError),

    #[error(transparent)]
    Execution(#[from] ember_execution::ExecutionError),
}
