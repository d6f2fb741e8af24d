use ember_instrument::Symbol;
use thiserror::Error;

/// Errors produced by the paper/live executor (C5, §7).
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("broker rejected the order for {symbol}: {reason}")]
    BrokerReject { symbol: Symbol, reason: String },

    #[error("transient network failure talking to the broker: {0}")]
    TransientNetwork(String),

    #[error("exchange adapter exhausted retries: {0}")]
    Unavailable(String),

    #[error("bus is shutting down")]
    ShuttingDown,
}

/// Errors produced by the smart order router (C6, §7).
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("aborted after {breaches} stop-loss-threshold breaches for {symbol}")]
    BreachLimitReached { symbol: Symbol, breaches: u32 },

    #[error("aborted after {attempts} failed placement attempts for {symbol}")]
    AttemptLimitReached { symbol: Symbol, attempts: u32 },

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
