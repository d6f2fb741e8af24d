use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Enumerated bar length. The `interval_code` matches the websocket feed's
/// `kline.{interval}.{symbol}` topic codes (§6 of the spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
pub enum Timeframe {
    #[display("1m")]
    M1,
    #[display("3m")]
    M3,
    #[display("5m")]
    M5,
    #[display("15m")]
    M15,
    #[display("1h")]
    H1,
    #[display("4h")]
    H4,
}

impl Timeframe {
    /// Websocket `kline.{interval}` subscription code.
    pub fn interval_code(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1",
            Timeframe::M3 => "3",
            Timeframe::M5 => "5",
            Timeframe::M15 => "15",
            Timeframe::H1 => "60",
            Timeframe::H4 => "240",
        }
    }

    /// Bar duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        match self {
            Timeframe::M1 => 60_000,
            Timeframe::M3 => 3 * 60_000,
            Timeframe::M5 => 5 * 60_000,
            Timeframe::M15 => 15 * 60_000,
            Timeframe::H1 => 60 * 60_000,
            Timeframe::H4 => 4 * 60 * 60_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_codes_match_websocket_feed() {
        assert_eq!(Timeframe::M1.interval_code(), "1");
        assert_eq!(Timeframe::H1.interval_code(), "60");
        assert_eq!(Timeframe::H4.interval_code(), "240");
    }
}
