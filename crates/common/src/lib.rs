//! Shared types for the order backend.
//!
//! Identifiers, the exact-decimal [`Money`] amount and the [`OrderStatus`]
//! variant are used by the store, the domain engine and the HTTP layer alike.

mod money;
mod status;
mod types;

pub use money::Money;
pub use status::{OrderStatus, StockEffect, UnknownStatus};
pub use types::{LineItemId, OrderId, ProductId, UserId};
