use rust_decimal::Decimal;

/// Lifecycle state of an [`Order`] (§3 Data Model).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Executed,
    Closed,
    Failed,
}

/// The broker instruction behind an order, distinguishing the paper
/// simulator's synthetic fills from real broker order types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Paper,
    Market,
    Limit,
}

/// An executed or pending leg of a [`crate::Position`] (§3 Data Model).
/// Immutable once constructed; a position accumulates a sequence of these
/// rather than mutating one in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub status: OrderStatus,
    pub kind: OrderKind,
    pub price: Decimal,
    pub size: Decimal,
    pub fee: Decimal,
}

impl Order {
    pub fn new(status: OrderStatus, kind: OrderKind, price: Decimal, size: Decimal, fee: Decimal) -> Self {
        Self {
            status,
            kind,
            price,
            size,
            fee,
        }
    }

    pub fn pending(kind: OrderKind, price: Decimal, size: Decimal) -> Self {
        Self::new(OrderStatus::Pending, kind, price, size, Decimal::ZERO)
    }
}
