/// The supervisor's coarse lifecycle state (§4.8): `INIT -> GENERATE ->
/// BACKTEST -> OPTIMIZE -> {BACKTEST | GENERATE | TRADING} -> STOPPED`.
/// Grounded in `system/system.py::SystemState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Init,
    Generate,
    Backtest,
    Optimize,
    Trading,
    Stopped,
}

/// Internal transition events driving the supervisor loop (§4.8.X),
/// grounded in `system/system.py::Event`. These are consumed off a private
/// `mpsc` channel rather than the bus — supervisor transitions are
/// process-internal and need neither dedup nor priority scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorEvent {
    GenerateComplete,
    RunBacktest,
    Regenerate,
    BacktestComplete,
    OptimizationComplete,
    TradingStopped,
    SystemStop,
}
