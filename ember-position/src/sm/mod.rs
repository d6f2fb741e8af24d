use crate::position::Position;
use ember_instrument::PositionSide;
use rust_decimal::Decimal;

/// States of the position lifecycle (§4.3). `WaitingSignal` is part of the
/// documented diagram but never observed as a distinct step in the
/// transition table below — a signal resolves straight from `Idle` to
/// `Opening` once the uniqueness guard passes, so it is kept here for
/// fidelity to the diagram rather than reached by any transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmState {
    Idle,
    WaitingSignal,
    Opening,
    Open,
    Closing,
    Closed,
    Failed,
}

/// The side-effect a transition asks its actor to emit (§4.3 "Action"
/// column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionFsmOutput {
    Initialized(Position),
    Opened(Position),
    CloseRequested(Position, Decimal),
    Closed(Position),
}

/// One side (long or short) of the position actor's pair of mirrored FSMs
/// (§4.3, §9 "two mirrored FSMs avoid a combinatorial state explosion").
/// Owns at most one [`Position`] at a time.
#[derive(Debug, Clone)]
pub struct PositionFsm {
    side: PositionSide,
    state: FsmState,
    position: Option<Position>,
}

impl PositionFsm {
    pub fn new(side: PositionSide) -> Self {
        Self {
            side,
            state: FsmState::Idle,
            position: None,
        }
    }

    pub fn state(&self) -> FsmState {
        self.state
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// `true` once a signal has created a position and it has not yet
    /// reached `Closed`/`Failed` — the guard behind "no active long"/"no
    /// active short" in the transition table.
    pub fn has_active_position(&self) -> bool {
        matches!(
            self.state,
            FsmState::Opening | FsmState::Open | FsmState::Closing
        )
    }

    /// `Idle -> Opening`: builds a position via `build` only if this side
    /// has no active position already (duplicate same-side signals are
    /// dropped without constructing a `Position` — and without consuming
    /// the RNG the break-even factors need).
    pub fn handle_signal<F: FnOnce() -> Position>(&mut self, build: F) -> Option<PositionFsmOutput> {
        if self.has_active_position() {
            return None;
        }
        let position = build();
        self.position = Some(position.clone());
        self.state = FsmState::Opening;
        Some(PositionFsmOutput::Initialized(position))
    }

    /// `Opening -> Open` on a same-side broker ack with non-zero size;
    /// any other state is not a valid source for this transition.
    pub fn handle_broker_opened(&mut self, broker_position: Position) -> Option<PositionFsmOutput> {
        if self.state != FsmState::Opening || broker_position.side() != self.side {
            return None;
        }
        self.position = Some(broker_position.clone());
        self.state = FsmState::Open;
        Some(PositionFsmOutput::Opened(broker_position))
    }

    /// `Opening -> Failed` when the broker reports the attempted open as
    /// already closed with zero size; `Closing -> Closed` for a normal
    /// exit ack. Both share the `BrokerPositionClosed` wire event, routed
    /// here by the actor per state rather than by a separate event type.
    pub fn handle_broker_closed(&mut self, broker_position: Position) -> Option<PositionFsmOutput> {
        match self.state {
            FsmState::Opening if broker_position.size() == Decimal::ZERO => {
                self.state = FsmState::Failed;
                self.position = None;
                None
            }
            FsmState::Closing => {
                self.state = FsmState::Closed;
                self.position = Some(broker_position.clone());
                Some(PositionFsmOutput::Closed(broker_position))
            }
            _ => None,
        }
    }

    /// `Open -> Closing` when a risk breach matches the stored position.
    pub fn handle_risk_breach(&mut self, position: Position, exit_price: Decimal) -> Option<PositionFsmOutput> {
        if self.state != FsmState::Open {
            return None;
        }
        let Some(stored) = &self.position else {
            return None;
        };
        if stored.id != position.id {
            return None;
        }
        self.state = FsmState::Closing;
        Some(PositionFsmOutput::CloseRequested(position, exit_price))
    }

    /// `Open -> Closing` on a forced backtest-end exit.
    pub fn handle_backtest_ended(&mut self, exit_price: Decimal) -> Option<PositionFsmOutput> {
        if self.state != FsmState::Open {
            return None;
        }
        let position = self.position.clone()?;
        self.state = FsmState::Closing;
        Some(PositionFsmOutput::CloseRequested(position, exit_price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Order, OrderKind, OrderStatus};
    use crate::signal::{Signal, SignalRisk};
    use ember_instrument::{Ohlcv, SignalSide, Symbol};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    fn symbol() -> Symbol {
        Symbol::try_new("BTCUSDT", dec!(0.001), 3, 2, dec!(0.0006), dec!(0.0002)).unwrap()
    }

    fn bar(ts: i64, o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Ohlcv {
        Ohlcv::try_new(ts, o, h, l, c, dec!(1)).unwrap()
    }

    fn build_position() -> Position {
        let mut rng = StdRng::seed_from_u64(1);
        let ohlcv = bar(0, dec!(100), dec!(100), dec!(95), dec!(100));
        let signal = Signal::new(
            symbol(),
            ember_instrument::Timeframe::M1,
            "ma-cross",
            SignalSide::Buy,
            dec!(100),
            dec!(95),
            ohlcv,
        );
        Position::new(&mut rng, dec!(1), signal, SignalRisk::none())
    }

    #[test]
    fn duplicate_signal_is_dropped_while_active() {
        let mut fsm = PositionFsm::new(PositionSide::Long);
        let first = fsm.handle_signal(build_position);
        assert!(matches!(first, Some(PositionFsmOutput::Initialized(_))));
        assert_eq!(fsm.state(), FsmState::Opening);

        let second = fsm.handle_signal(build_position);
        assert!(second.is_none());
    }

    #[test]
    fn opening_to_open_to_closing_to_closed() {
        let mut fsm = PositionFsm::new(PositionSide::Long);
        fsm.handle_signal(build_position);

        let mut opened = build_position();
        opened = opened.fill_order(Order::new(
            OrderStatus::Executed,
            OrderKind::Paper,
            dec!(100),
            dec!(1),
            dec!(0.01),
        ));
        let out = fsm.handle_broker_opened(opened.clone());
        assert!(matches!(out, Some(PositionFsmOutput::Opened(_))));
        assert_eq!(fsm.state(), FsmState::Open);

        let breach = fsm.handle_risk_breach(opened.clone(), dec!(95));
        assert!(matches!(breach, Some(PositionFsmOutput::CloseRequested(_, _))));
        assert_eq!(fsm.state(), FsmState::Closing);

        let closed = opened.fill_order(Order::new(
            OrderStatus::Closed,
            OrderKind::Paper,
            dec!(95),
            dec!(1),
            dec!(0.01),
        ));
        let out = fsm.handle_broker_closed(closed);
        assert!(matches!(out, Some(PositionFsmOutput::Closed(_))));
        assert_eq!(fsm.state(), FsmState::Closed);
    }

    #[test]
    fn zero_size_broker_close_in_opening_fails_without_emitting() {
        let mut fsm = PositionFsm::new(PositionSide::Long);
        fsm.handle_signal(build_position);

        let rejected = build_position().fill_order(Order::new(
            OrderStatus::Closed,
            OrderKind::Paper,
            dec!(0),
            dec!(0),
            dec!(0),
        ));
        let out = fsm.handle_broker_closed(rejected);
        assert!(out.is_none());
        assert_eq!(fsm.state(), FsmState::Failed);
    }
}
