use thiserror::Error;

/// Errors produced by the bus itself (§7).
#[derive(Debug, Error)]
pub enum BusError {
    /// A handler returned an error; logged and swallowed for events, but
    /// surfaced to the `execute`/`query` caller for commands/queries.
    #[error("handler failed: {0}")]
    Handler(#[from] HandlerError),

    /// `stop()` was called and this operation can no longer complete.
    #[error("bus is shutting down")]
    ShuttingDown,

    /// A query of this type has no registered handler.
    #[error("no handler registered for query")]
    NoQueryHandler,

    /// The handler's response could not be downcast to the query's declared
    /// `Response` type. Indicates two query types collided on `TypeId`,
    /// which should never happen in practice.
    #[error("query handler returned an unexpected response type")]
    ResponseTypeMismatch,
}

/// Error a registered handler may return. Never propagated to peer actors
/// (§7 "HandlerError — logged and swallowed at the bus").
#[derive(Debug, Error, Clone)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
