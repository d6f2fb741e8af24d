//! TWAP entry price generator (§4.6.X): an injectable price-sampling
//! iterator the router consumes one chunk at a time, standing in for a
//! literal order-book call so unit tests (S5) stay deterministic.

use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Source of successive TWAP reference prices the router samples one chunk
/// at a time. Lets tests (S5) inject a literal price sequence instead of
/// going through the randomised jitter of [`TwapPriceStream`].
pub trait TwapSource {
    fn next_price(&mut self) -> Decimal;
}

/// Yields successive reference entry prices around a desired entry,
/// jittered by a configurable spread — the Rust realisation of the
/// Python source's `entry_price.calculate` generator (§4.6.X).
pub struct TwapPriceStream<R: Rng> {
    desired_entry: Decimal,
    spread: Decimal,
    rng: R,
}

impl<R: Rng> TwapPriceStream<R> {
    pub fn new(desired_entry: Decimal, spread: Decimal, rng: R) -> Self {
        Self {
            desired_entry,
            spread,
            rng,
        }
    }

}

impl<R: Rng> TwapSource for TwapPriceStream<R> {
    /// Sample the next reference price: `desired_entry + jitter` where
    /// `jitter ∈ [-spread, spread]`.
    fn next_price(&mut self) -> Decimal {
        let jitter_fraction = self.rng.random_range(-1.0f64..=1.0f64);
        let jitter = self.spread * Decimal::from_f64_lossy(jitter_fraction);
        self.desired_entry + jitter
    }
}

/// A fixed, pre-recorded sequence of TWAP prices, consumed in order and
/// repeating the last price once exhausted. Used by tests that need an
/// exact, literal price sequence (S5).
pub struct FixedTwapSource {
    prices: std::vec::IntoIter<Decimal>,
    last: Decimal,
}

impl FixedTwapSource {
    pub fn new(prices: Vec<Decimal>) -> Self {
        let last = prices.last().copied().unwrap_or(Decimal::ZERO);
        Self {
            prices: prices.into_iter(),
            last,
        }
    }
}

impl TwapSource for FixedTwapSource {
    fn next_price(&mut self) -> Decimal {
        match self.prices.next() {
            Some(p) => {
                self.last = p;
                p
            }
            None => self.last,
        }
    }
}

trait FromF64Lossy {
    fn from_f64_lossy(value: f64) -> Self;
}

impl FromF64Lossy for Decimal {
    fn from_f64_lossy(value: f64) -> Self {
        Decimal::from_f64_retain(value).unwrap_or(Decimal::ZERO)
    }
}

/// Split `total` into `n` chunk quantities summing exactly to `total`,
/// each independently weighted so no two chunks (beyond the rounding
/// remainder) are identical — mirrors the teacher's randomised-weight
/// slicing in its own TWAP helper.
pub fn slice_quantities<R: Rng>(total: Decimal, n: u32, rng: &mut R) -> Vec<Decimal> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![total];
    }

    let weights: Vec<f64> = (0..n).map(|_| rng.random_range(0.5..1.5)).collect();
    let weight_sum: f64 = weights.iter().sum();

    let mut chunks: Vec<Decimal> = weights
        .iter()
        .map(|w| total * Decimal::from_f64_lossy(w / weight_sum))
        .collect();

    // Assign any rounding remainder to the last chunk so the sum is exact.
    let allocated: Decimal = chunks.iter().take(chunks.len() - 1).copied().sum();
    if let Some(last) = chunks.last_mut() {
        *last = total - allocated;
    }
    chunks
}

/// `N = min(max(1, size / min_size), max_order_slice)` (§4.6).
pub fn chunk_count(size: Decimal, min_size: Decimal, max_order_slice: u32) -> u32 {
    if min_size <= Decimal::ZERO {
        return 1;
    }
    let raw = (size / min_size).round().to_i64().unwrap_or(1).max(1) as u32;
    raw.min(max_order_slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    #[test]
    fn chunk_count_respects_slice_bounds() {
        assert_eq!(chunk_count(dec!(10), dec!(1), 5), 5);
        assert_eq!(chunk_count(dec!(0.5), dec!(1), 5), 1);
        assert_eq!(chunk_count(dec!(3), dec!(1), 5), 3);
    }

    #[test]
    fn slice_quantities_sum_to_total() {
        let mut rng = StdRng::seed_from_u64(42);
        let chunks = slice_quantities(dec!(10), 4, &mut rng);
        assert_eq!(chunks.len(), 4);
        let sum: Decimal = chunks.iter().copied().sum();
        assert_eq!(sum, dec!(10));
    }

    #[test]
    fn twap_prices_stay_within_spread_of_desired_entry() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut stream = TwapPriceStream::new(dec!(100), dec!(0.5), &mut rng);
        for _ in 0..20 {
            let price = stream.next_price();
            assert!(price >= dec!(99.5) && price <= dec!(100.5));
        }
    }
}
