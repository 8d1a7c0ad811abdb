//! Order placement, status transitions and their errors.

mod engine;
mod service;

pub use engine::{OrderEngine, OrderLine, PlacedOrder};
pub use service::{OrderItemRequest, OrderService, PlaceOrderRequest, UpdateStatusRequest};

use std::collections::BTreeMap;

use common::{Money, OrderId, OrderStatus, ProductId, UnknownStatus};
use thiserror::Error;

use crate::error::ErrorCategory;

/// Why a single requested product was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ItemRejection {
    /// No product with the requested id.
    #[error("product not found")]
    ProductNotFound,

    /// The product exists but has fewer units than requested.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    /// Quantity times unit price is larger than an order line can hold.
    #[error("line total exceeds the maximum order amount")]
    AmountTooLarge,
}

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The order has no items.
    #[error("Order must contain at least one item")]
    EmptyItems,

    /// A product id could not be parsed.
    #[error("Invalid product id: {0}")]
    InvalidProductId(String),

    /// An order id could not be parsed.
    #[error("Invalid order id: {0}")]
    InvalidOrderId(String),

    /// A quantity is zero or negative.
    #[error("Invalid quantity for product {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// A quantity, alone or summed over repeated lines, does not fit in stock.
    #[error(
        "Quantity for product {product_id} is too large: {quantity} (at most {max})",
        max = i32::MAX
    )]
    QuantityTooLarge { product_id: ProductId, quantity: i64 },

    /// The sum of the line prices is larger than an order can hold.
    #[error("Order total exceeds the maximum of {limit}")]
    TotalTooLarge { limit: Money },

    /// One or more requested products failed validation.
    #[error("{} order item(s) rejected", .0.len())]
    ItemsRejected(BTreeMap<ProductId, ItemRejection>),

    /// The requested status is not a known status.
    #[error(transparent)]
    UnknownStatus(#[from] UnknownStatus),

    /// The order does not exist or does not belong to the caller.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The caller may not move the order from its current status.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The caller lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(&'static str),
}

impl OrderError {
    pub(crate) fn category(&self) -> ErrorCategory {
        match self {
            OrderError::OrderNotFound(_) => ErrorCategory::NotFound,
            OrderError::Forbidden(_) => ErrorCategory::Forbidden,
            _ => ErrorCategory::Validation,
        }
    }

    pub(crate) fn details(&self) -> BTreeMap<String, String> {
        match self {
            OrderError::ItemsRejected(rejections) => rejections
                .iter()
                .map(|(id, reason)| (id.to_string(), reason.to_string()))
                .collect(),
            OrderError::InvalidQuantity { product_id, .. } => BTreeMap::from([(
                product_id.to_string(),
                "quantity must be greater than zero".to_string(),
            )]),
            OrderError::QuantityTooLarge { product_id, .. } => BTreeMap::from([(
                product_id.to_string(),
                "quantity is too large".to_string(),
            )]),
            _ => BTreeMap::new(),
        }
    }
}
