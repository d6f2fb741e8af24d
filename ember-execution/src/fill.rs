//! Fill-price policy shared by the paper and live executors (§4.5).
//! Grounded in `executor/_paper_actor.py`'s intrabar fill logic and the
//! `MarketSimulator`-style pure pricing functions in
//! `jackbot/src/backtest/simulation.rs`.

use ember_instrument::{Ohlcv, PositionSide};
use rust_decimal::Decimal;

/// Clamp `requested` to a bar's realised range, approaching from whichever
/// side the bar's intrabar path visited first (§4.5 "OHLC"/"OLHC").
///
/// `OHLC` (open → high → low → close, i.e. the bar leans toward the high
/// first): a LONG fill at `requested` succeeds if it's within `[low,
/// high]`, else it fills at `high` (the price ran away before the order
/// could rest at the requested level). `OLHC` is the SHORT-side mirror
/// using `low`. Anything else (the order's side doesn't match the bar's
/// lean) fills at `close`.
pub fn entry_fill_price(side: PositionSide, requested: Decimal, bar: &Ohlcv) -> Decimal {
    let ohlc = bar.leans_high_first();
    match (side, ohlc) {
        (PositionSide::Long, true) => {
            if requested >= bar.low && requested <= bar.high {
                requested
            } else {
                bar.high
            }
        }
        (PositionSide::Short, false) => {
            if requested >= bar.low && requested <= bar.high {
                requested
            } else {
                bar.low
            }
        }
        _ => bar.close,
    }
}

/// Exit fill price: candidates are the order price, take-profit and
/// stop-loss, each individually clamped into the bar's range the same way
/// as an entry, then the worst-for-trader of the three is taken — `min`
/// for LONG exits (the lowest of the three), `max` for SHORT exits (§4.5).
pub fn exit_fill_price(side: PositionSide, order_price: Decimal, take_profit: Decimal, stop_loss: Decimal, bar: &Ohlcv) -> Decimal {
    let candidates = [
        entry_fill_price(side, order_price, bar),
        entry_fill_price(side, take_profit, bar),
        entry_fill_price(side, stop_loss, bar),
    ];

    match side {
        PositionSide::Long => candidates.into_iter().min().unwrap(),
        PositionSide::Short => candidates.into_iter().max().unwrap(),
    }
}

/// `size · price · rate` — shared by both the taker (market) and maker
/// (resting limit) fee schedules; callers pick the rate.
pub fn fee(size: Decimal, price: Decimal, rate: Decimal) -> Decimal {
    size * price * rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ohlc_bar() -> Ohlcv {
        Ohlcv::try_new(0, dec!(10), dec!(15), dec!(8), dec!(11), dec!(1)).unwrap()
    }

    #[test]
    fn long_entry_fills_at_requested_when_within_range() {
        let bar = ohlc_bar();
        assert_eq!(entry_fill_price(PositionSide::Long, dec!(12), &bar), dec!(12));
    }

    #[test]
    fn long_entry_fills_at_high_when_requested_escapes_range() {
        let bar = ohlc_bar();
        assert_eq!(entry_fill_price(PositionSide::Long, dec!(20), &bar), dec!(15));
    }

    #[test]
    fn exit_fill_is_worst_for_trader_on_long() {
        let bar = ohlc_bar();
        // candidates all within range: 9 (order), 14 (tp), 9.5 (sl) -> min = 9
        let price = exit_fill_price(PositionSide::Long, dec!(9), dec!(14), dec!(9.5), &bar);
        assert_eq!(price, dec!(9));
    }

    #[test]
    fn fill_never_escapes_bar_range() {
        // Testable property 6: min(low, request) <= p <= max(high, request)
        let bar = ohlc_bar();
        for requested in [dec!(-5), dec!(5), dec!(12), dec!(30)] {
            let p = entry_fill_price(PositionSide::Long, requested, &bar);
            assert!(p >= bar.low.min(requested));
            assert!(p <= bar.high.max(requested));
        }
    }
}
