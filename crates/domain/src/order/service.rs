//! Order service translating request shapes into engine calls.

use common::{OrderId, OrderStatus, ProductId};
use serde::{Deserialize, Serialize};
use store::Store;

use super::{OrderEngine, OrderError, OrderLine, PlacedOrder};
use crate::actor::Actor;
use crate::error::ServiceError;

/// One requested item as it arrives from a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRequest {
    #[serde(alias = "productId")]
    pub product_id: String,
    pub quantity: i64,
}

/// Body of an order placement request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderItemRequest>,
}

/// Body of an admin status change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Service for managing orders.
///
/// Parses client-supplied ids, quantities and status names, delegates to
/// [`OrderEngine`] and reports failures as [`ServiceError`] categories.
pub struct OrderService<S: Store> {
    engine: OrderEngine<S>,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service with the given store.
    pub fn new(store: S) -> Self {
        Self {
            engine: OrderEngine::new(store),
        }
    }

    /// Places an order for the caller.
    #[tracing::instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn place_order(
        &self,
        actor: Actor,
        request: PlaceOrderRequest,
    ) -> Result<PlacedOrder, ServiceError> {
        let lines = parse_lines(request)?;
        Ok(self.engine.place_order(actor.user_id, lines).await?)
    }

    /// Lists the caller's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, actor: Actor) -> Result<Vec<PlacedOrder>, ServiceError> {
        Ok(self.engine.orders_for_user(actor.user_id).await?)
    }

    /// Cancels one of the caller's pending orders.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        actor: Actor,
        order_id: &str,
    ) -> Result<PlacedOrder, ServiceError> {
        let order_id = parse_order_id(order_id)?;
        Ok(self.engine.cancel_order(actor, order_id).await?)
    }

    /// Moves any order to the named status. Admin only.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        actor: Actor,
        order_id: &str,
        status: &str,
    ) -> Result<PlacedOrder, ServiceError> {
        if !actor.is_admin {
            return Err(OrderError::Forbidden("changing order status requires admin").into());
        }
        let order_id = parse_order_id(order_id)?;
        let target: OrderStatus = status.parse().map_err(OrderError::from)?;
        Ok(self.engine.set_status(actor, order_id, target).await?)
    }
}

fn parse_order_id(raw: &str) -> Result<OrderId, OrderError> {
    raw.trim()
        .parse()
        .map_err(|_| OrderError::InvalidOrderId(raw.to_string()))
}

fn parse_lines(request: PlaceOrderRequest) -> Result<Vec<OrderLine>, OrderError> {
    if request.items.is_empty() {
        return Err(OrderError::EmptyItems);
    }

    request
        .items
        .into_iter()
        .map(|item| -> Result<OrderLine, OrderError> {
            let product_id: ProductId = item
                .product_id
                .trim()
                .parse()
                .map_err(|_| OrderError::InvalidProductId(item.product_id.clone()))?;
            if item.quantity <= 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id,
                    quantity: item.quantity,
                });
            }
            let quantity =
                i32::try_from(item.quantity).map_err(|_| OrderError::QuantityTooLarge {
                    product_id,
                    quantity: item.quantity,
                })?;
            Ok(OrderLine::new(product_id, quantity))
        })
        .collect()
}
