//! Strategy/performance collaborator interfaces (C9 boundary, §1 "the
//! genetic strategy generator... treated as pure functions producing
//! signals/scores" and "broad portfolio statistics... the contract the
//! performance collaborator must satisfy"). No concrete implementation
//! lives here; `ember-supervisor` drives the FSM through these seams and
//! the root crate owns whatever generator/analytics it wires in.

use crate::performance::{PerformanceReport, PerformanceVector};
use crate::strategy::Strategy;
use async_trait::async_trait;
use ember_instrument::{Ohlcv, Symbol, Timeframe};
use ember_position::{Signal, SignalRisk};

/// A candidate long/short signal a strategy would raise for the given bar,
/// or nothing if the strategy has no opinion (§2 "signal actor ... produces
/// long/short signals").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyDecision {
    pub signal: Signal,
    pub risk: SignalRisk,
}

/// The genetic optimizer/generator collaborator (§6, §9 Open Question:
/// "generator is out of scope"). `ember-supervisor`'s GENERATE/OPTIMIZE
/// states call through this seam; the concrete genetic-algorithm
/// implementation is never part of this crate.
#[async_trait]
pub trait StrategyGenerator: Send + Sync {
    /// Produce an initial population of `(symbol, timeframe, strategy)`
    /// triples to backtest, one per entry in `symbols` (§9.4.8 `_generate`).
    async fn generate(&mut self, symbols: &[Symbol], timeframes: &[Timeframe]) -> Vec<(Symbol, Timeframe, Strategy)>;

    /// Run one optimizer step over the current population. Returns `true`
    /// once the search has converged (`System._run_optimization`'s
    /// `self.optimizer.done`).
    async fn optimize(&mut self) -> bool;

    /// Evaluate `strategy` against `bar` (and whatever history the
    /// generator keeps internally) to produce a trade idea, or `None`.
    async fn signal(&self, strategy: &Strategy, symbol: &Symbol, timeframe: Timeframe, bar: &Ohlcv) -> Option<StrategyDecision>;
}

/// Performance analytics collaborator (§1, §4.7.X): turns a squad's closed
/// positions into the vector `StrategyStorage` clusters on plus the
/// logging-only advanced report.
#[async_trait]
pub trait PerformanceAnalytics: Send + Sync {
    async fn evaluate(&self, closed_positions: &[ember_position::Position]) -> (PerformanceVector, PerformanceReport);
}
