use rust_decimal::Decimal;

/// The vector `StrategyStorage` clusters and ranks on (§4.7.X). Coordinate
/// 0 is total return — the `get_top` sort key — and the last coordinate is
/// net PnL — the `positive_pnl` filter key. Any coordinates in between are
/// whatever additional normalized signal the performance collaborator
/// wants clustered on; `StrategyStorage` never interprets them.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceVector(Vec<Decimal>);

impl PerformanceVector {
    pub fn new(coordinates: Vec<Decimal>) -> Self {
        assert!(
            coordinates.len() >= 2,
            "a performance vector needs at least a return and a pnl coordinate"
        );
        Self(coordinates)
    }

    pub fn as_slice(&self) -> &[Decimal] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The `get_top` sort key (§4.7).
    pub fn total_return(&self) -> Decimal {
        self.0[0]
    }

    /// The `positive_pnl` filter key (§4.7).
    pub fn net_pnl(&self) -> Decimal {
        self.0[self.0.len() - 1]
    }
}

/// Broad portfolio statistics (§1 "summarized here only as the contract
/// the performance collaborator must satisfy"), consumed only by
/// logging/diagnostics — never by clustering or `get_top` (§4.7.X).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerformanceReport {
    pub sharpe_ratio: Decimal,
    pub sortino_ratio: Decimal,
    pub max_drawdown: Decimal,
    pub win_rate: Decimal,
    pub profit_factor: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn exposes_first_and_last_coordinate() {
        let v = PerformanceVector::new(vec![dec!(1.5), dec!(0.3), dec!(-2)]);
        assert_eq!(v.total_return(), dec!(1.5));
        assert_eq!(v.net_pnl(), dec!(-2));
    }

    #[test]
    #[should_panic]
    fn rejects_degenerate_vectors() {
        PerformanceVector::new(vec![dec!(1)]);
    }
}
