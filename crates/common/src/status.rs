//! Order status and the stock effect of moving between statuses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The status of an order.
///
/// ```text
/// Pending ──┬──► Completed
///           └──► Cancelled
/// ```
///
/// Owners may only cancel a pending order. Admins may move an order to any
/// status, and stock is compensated according to [`StockEffect::between`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed, stock consumed.
    #[default]
    Pending,

    /// Fulfilled, stock stays consumed.
    Completed,

    /// Cancelled, stock returned to the catalog.
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in declaration order.
    pub const ALL: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// Returns true while the order's line quantities are withheld from stock.
    pub fn holds_stock(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Completed)
    }

    /// Returns true if the owning user may cancel from this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns the persisted/wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when text does not name an [`OrderStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    /// Parses a status name, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Stock write required when an order moves between two statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    /// No stock write.
    None,
    /// Return every line's quantity to stock.
    Restock,
    /// Take every line's quantity out of stock again.
    Consume,
}

impl StockEffect {
    /// Computes the stock effect of moving from `from` to `to`.
    pub fn between(from: OrderStatus, to: OrderStatus) -> Self {
        match (from.holds_stock(), to.holds_stock()) {
            (true, false) => StockEffect::Restock,
            (false, true) => StockEffect::Consume,
            _ => StockEffect::None,
        }
    }

    /// Sign applied to a line quantity to build the stock delta.
    pub fn sign(&self) -> i32 {
        match self {
            StockEffect::None => 0,
            StockEffect::Restock => 1,
            StockEffect::Consume => -1,
        }
    }

    /// Short label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            StockEffect::None => "none",
            StockEffect::Restock => "restock",
            StockEffect::Consume => "consume",
        }
    }
}
