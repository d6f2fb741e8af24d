use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `position.*` configuration options (§6) consumed by the smart order
/// router (C6).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RouterConfig {
    /// Seconds slept between successive TWAP chunk placements when no
    /// breach occurred.
    pub entry_timeout_secs: u64,
    /// `0 < x < 1`: a TWAP-sampled price within `threshold * |SL - desired
    /// entry|` of the stop-loss counts as a risk breach.
    pub stop_loss_threshold: Decimal,
    /// Upper bound on the number of chunks a desired size is sliced into.
    pub max_order_slice: u32,
    /// Router aborts once this many chunk attempts have been counted as a
    /// risk breach.
    pub max_order_breach: u32,
    /// Router aborts once this many total placement attempts (successes
    /// and failures) have been made.
    pub max_open_order_attempts: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            entry_timeout_secs: 1,
            stop_loss_threshold: Decimal::new(5, 1), // 0.5
            max_order_slice: 5,
            max_order_breach: 3,
            max_open_order_attempts: 10,
        }
    }
}

/// Fixed sleep applied between chunk placements after a breach (§4.6 "3s on
/// breach, configurable otherwise").
pub const BREACH_SLEEP_SECS: u64 = 3;

/// `risk.buffer` (§6): an SL margin the risk actor/router may apply; the
/// core carries the config value but the margin itself is applied by the
/// (out of scope) TA floor collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RiskConfig {
    pub buffer: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            buffer: Decimal::ZERO,
        }
    }
}
