use crate::order::{Order, OrderKind, OrderStatus};
use crate::risk::{PositionRisk, PositionRiskType, StopLossFloor};
use crate::signal::{Signal, SignalRisk};
use ember_instrument::{Ohlcv, PositionSide};
use rand::Rng;
use rust_decimal::Decimal;
use uuid::Uuid;

/// The three randomised break-even factors sampled once at position
/// construction (§3 Data Model, §9 "must be reproducible in tests via an
/// injectable RNG"). `f1 < f2 < f3` by construction of the sampling ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakEvenFactors {
    pub f1: Decimal,
    pub f2: Decimal,
    pub f3: Decimal,
}

impl BreakEvenFactors {
    pub fn sample<R: Rng>(rng: &mut R) -> Self {
        Self {
            f1: sample_range(rng, 0.13, 0.3),
            f2: sample_range(rng, 0.32, 0.8),
            f3: sample_range(rng, 0.9, 1.8),
        }
    }
}

fn sample_range<R: Rng>(rng: &mut R, lo: f64, hi: f64) -> Decimal {
    let sampled = rng.random_range(lo..hi);
    Decimal::from_f64_retain(sampled).unwrap_or(Decimal::ZERO)
}

/// An open or closed trade: an ordered sequence of [`Order`]s plus the
/// signal/risk state that produced it (§3 Data Model, §4.4).
///
/// Every mutating method (`fill_order`, `next`, `force_exit`) returns a new
/// `Position` rather than mutating in place, matching §9 "frozen values
/// with copy-on-update" — the owning actor reassigns its field, it never
/// mutates through a shared reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub id: Uuid,
    pub initial_size: Decimal,
    pub signal: Signal,
    pub signal_risk: SignalRisk,
    pub position_risk: PositionRisk,
    pub orders: Vec<Order>,
    pub expiration_ms: i64,
    pub factors: BreakEvenFactors,
    override_tp: Option<Decimal>,
    override_sl: Option<Decimal>,
}

/// 15 minutes, the default expiration (§3 Data Model).
pub const DEFAULT_EXPIRATION_MS: i64 = 900_000;

impl Position {
    pub fn new<R: Rng>(
        rng: &mut R,
        initial_size: Decimal,
        signal: Signal,
        signal_risk: SignalRisk,
    ) -> Self {
        let opening_bar = signal.ohlcv;
        Self {
            id: Uuid::new_v4(),
            initial_size,
            signal,
            signal_risk,
            position_risk: PositionRisk::new(opening_bar),
            orders: Vec::new(),
            expiration_ms: DEFAULT_EXPIRATION_MS,
            factors: BreakEvenFactors::sample(rng),
            override_tp: None,
            override_sl: None,
        }
    }

    pub fn side(&self) -> PositionSide {
        self.signal.side.into()
    }

    fn price_precision(&self) -> u32 {
        self.signal.symbol.price_precision
    }

    fn break_even_target(&self, factor: Decimal) -> Decimal {
        let entry = self.entry_price();
        let dist = (factor * (entry - self.signal.stop_loss).abs()).round_dp(self.price_precision());
        match self.side() {
            PositionSide::Long => entry + dist,
            PositionSide::Short => entry - dist,
        }
    }

    pub fn first_take_profit(&self) -> Decimal {
        self.break_even_target(self.factors.f1)
    }

    pub fn second_take_profit(&self) -> Decimal {
        self.break_even_target(self.factors.f2)
    }

    pub fn third_take_profit(&self) -> Decimal {
        self.break_even_target(self.factors.f3)
    }

    pub fn take_profit(&self) -> Decimal {
        let p = self.price_precision();
        if let Some(tp) = self.override_tp {
            return tp.round_dp(p);
        }
        if let Some(tp) = self.signal_risk.take_profit {
            return tp.round_dp(p);
        }
        self.third_take_profit().round_dp(p)
    }

    pub fn stop_loss(&self) -> Decimal {
        let p = self.price_precision();
        if let Some(sl) = self.override_sl {
            return sl.round_dp(p);
        }
        self.signal.stop_loss.round_dp(p)
    }

    pub fn open_timestamp(&self) -> i64 {
        self.signal.ohlcv.timestamp
    }

    pub fn close_timestamp(&self) -> i64 {
        self.position_risk.last_bar.timestamp
    }

    pub fn open_orders(&self) -> Vec<&Order> {
        self.orders
            .iter()
            .filter(|o| o.status == OrderStatus::Executed)
            .collect()
    }

    pub fn closed_orders(&self) -> Vec<&Order> {
        self.orders
            .iter()
            .filter(|o| o.status == OrderStatus::Closed)
            .collect()
    }

    pub fn rejected_orders(&self) -> Vec<&Order> {
        self.orders
            .iter()
            .filter(|o| o.status == OrderStatus::Failed)
            .collect()
    }

    fn average_price(orders: &[&Order]) -> Decimal {
        if orders.is_empty() {
            return Decimal::ZERO;
        }
        let total: Decimal = orders.iter().map(|o| o.price).sum();
        total / Decimal::from(orders.len())
    }

    fn average_size(orders: &[&Order]) -> Decimal {
        if orders.is_empty() {
            return Decimal::ZERO;
        }
        let total: Decimal = orders.iter().map(|o| o.size).sum();
        total / Decimal::from(orders.len())
    }

    pub fn entry_price(&self) -> Decimal {
        Self::average_price(&self.open_orders())
    }

    pub fn exit_price(&self) -> Decimal {
        Self::average_price(&self.closed_orders())
    }

    pub fn size(&self) -> Decimal {
        let closed = self.closed_orders();
        if !closed.is_empty() {
            return Self::average_size(&closed);
        }
        let open = self.open_orders();
        if !open.is_empty() {
            return Self::average_size(&open);
        }
        Decimal::ZERO
    }

    /// `(high + low + close) / 3` of the last-seen bar, rounded to
    /// `price_precision` (§4.4).
    pub fn curr_price(&self) -> Decimal {
        self.position_risk.last_bar.typical_price().round_dp(self.price_precision())
    }

    pub fn closed(&self) -> bool {
        if self.orders.is_empty() {
            return false;
        }
        if !self.rejected_orders().is_empty() {
            return true;
        }
        let closed = self.closed_orders();
        if closed.is_empty() {
            return false;
        }
        let diff = Self::average_size(&self.open_orders()) - Self::average_size(&closed);
        diff <= Decimal::ZERO
    }

    pub fn has_break_even(&self) -> bool {
        match self.side() {
            PositionSide::Long => self.stop_loss() >= self.entry_price(),
            PositionSide::Short => self.stop_loss() <= self.entry_price(),
        }
    }

    /// LONG holds `take_profit > stop_loss`, SHORT the reverse; once
    /// closed, requires a non-zero size and a strictly ordered open/close
    /// timestamp (§4.4 invariant, Testable Property 1).
    pub fn is_valid(&self) -> bool {
        if self.closed() {
            return self.size() != Decimal::ZERO && self.open_timestamp() < self.close_timestamp();
        }
        match self.side() {
            PositionSide::Long => self.take_profit() > self.stop_loss(),
            PositionSide::Short => self.take_profit() < self.stop_loss(),
        }
    }

    pub fn pnl(&self) -> Decimal {
        if !self.closed() {
            return Decimal::ZERO;
        }
        Decimal::from(self.side().sign()) * (self.exit_price() - self.entry_price()) * self.size()
    }

    pub fn curr_pnl(&self) -> Decimal {
        Decimal::from(self.side().sign()) * (self.curr_price() - self.entry_price()) * self.size()
    }

    pub fn fee(&self) -> Decimal {
        self.orders.iter().map(|o| o.fee).sum()
    }

    pub fn entry_order(&self) -> Order {
        let symbol = &self.signal.symbol;
        let price = symbol.round_price(self.signal.entry);
        let size = symbol.round_size(self.initial_size.max(symbol.min_position_size));
        Order::pending(OrderKind::Paper, price, size)
    }

    pub fn exit_order(&self) -> Order {
        let size = Self::average_size(&self.open_orders()) - Self::average_size(&self.closed_orders());
        let price = self
            .position_risk
            .exit_price(self.side(), self.take_profit(), self.stop_loss());
        Order::pending(OrderKind::Paper, price, size)
    }

    /// Append a fill. A no-op once the position is already closed.
    pub fn fill_order(&self, order: Order) -> Self {
        if self.closed() || order.status == OrderStatus::Pending {
            return self.clone();
        }
        let mut next = self.clone();
        next.orders.push(order);
        next
    }

    /// The break-even ladder (§4.4 step 2): starting from the current SL,
    /// tighten it each time price has crossed a successive break-even
    /// target. `max` for LONG / `min` for SHORT because a higher (LONG) or
    /// lower (SHORT) stop is strictly tighter — see DESIGN.md for why this
    /// departs from the source's literal clamp direction.
    pub fn break_even(&self) -> Decimal {
        let curr_price = self.curr_price();
        let mut sl = self.stop_loss();

        let first = self.first_take_profit();
        let second = self.second_take_profit();
        let third = self.third_take_profit();

        match self.side() {
            PositionSide::Long => {
                if curr_price >= first {
                    sl = sl.max(self.entry_price());
                }
                if curr_price >= second {
                    sl = sl.max(first);
                }
                if curr_price >= third {
                    sl = sl.max(second);
                }
            }
            PositionSide::Short => {
                if curr_price <= first {
                    sl = sl.min(self.entry_price());
                }
                if curr_price <= second {
                    sl = sl.min(first);
                }
                if curr_price <= third {
                    sl = sl.min(second);
                }
            }
        }

        sl
    }

    /// Advance the position to a new bar: skip stale bars, recompute the
    /// break-even ladder, optionally ratchet via a TA floor, and reassess
    /// risk type (§4.4 steps 0-4).
    pub fn next(&self, ohlcv: Ohlcv, floor: &dyn StopLossFloor) -> Self {
        if self.closed() {
            return self.clone();
        }
        if ohlcv.timestamp <= self.position_risk.last_bar.timestamp {
            return self.clone();
        }

        let mut next = self.clone();
        next.position_risk = self.position_risk.advance(ohlcv);

        let next_tp = self.take_profit();
        let mut next_sl = next.break_even();
        next_sl = floor.floor(self.side(), &ohlcv, next_sl);

        next.position_risk = next.position_risk.assess(
            self.side(),
            next_tp,
            next_sl,
            self.open_timestamp(),
            self.expiration_ms,
        );
        next.override_tp = Some(next_tp);
        next.override_sl = Some(next_sl);

        next
    }

    /// A manual exit override (e.g. an operator-forced close): only takes
    /// effect if the requested price is already past the first break-even
    /// target, matching the source's guard against worsening the exit.
    pub fn force_exit(&self, price: Decimal) -> Self {
        let first = self.first_take_profit();
        let triggers = match self.side() {
            PositionSide::Long => price > first,
            PositionSide::Short => price < first,
        };
        if !triggers {
            return self.clone();
        }
        let mut next = self.clone();
        next.override_tp = Some(price);
        next
    }

    pub fn risk_type(&self) -> PositionRiskType {
        self.position_risk.risk_type
    }

    pub fn has_risk(&self) -> bool {
        self.risk_type() != PositionRiskType::None
    }
}
