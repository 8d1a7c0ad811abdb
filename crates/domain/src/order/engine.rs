//! Order transaction engine.
//!
//! Placement and status transitions each run as one unit of work: every
//! stock check, stock write and order write of a call commits together or
//! not at all.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use common::{LineItemId, Money, OrderId, OrderStatus, ProductId, StockEffect, UserId};
use serde::{Deserialize, Serialize};
use store::{
    InventoryRepository, NewOrder, Order, OrderLineItem, OrderRepository, Product, Store,
    Transaction, run_in_transaction,
};

use super::{ItemRejection, OrderError};
use crate::actor::Actor;
use crate::error::DomainError;

/// One requested `(product, quantity)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl OrderLine {
    pub fn new(product_id: ProductId, quantity: i32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// An order header together with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedOrder {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLineItem>,
}

/// Who is asking for a transition.
#[derive(Debug, Clone, Copy)]
enum Authority {
    /// The owning user; only pending orders, only if they own it.
    Owner(UserId),
    /// Administrative override; any status to any status.
    Admin,
}

/// Places orders against live inventory and moves them between statuses.
///
/// The engine holds no state of its own beyond the store handle, so one
/// instance can serve any number of concurrent requests. Contention on the
/// same product is resolved by the store's row locking.
pub struct OrderEngine<S: Store> {
    store: S,
}

impl<S: Store> OrderEngine<S> {
    /// Creates a new engine over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places an order for `user_id`.
    ///
    /// Every line is checked against the locked product rows before anything
    /// is written; all failing lines are reported together in
    /// [`OrderError::ItemsRejected`]. Lines naming the same product are
    /// merged first.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        lines: Vec<OrderLine>,
    ) -> Result<PlacedOrder, DomainError> {
        let start = Instant::now();

        let result = match coalesce(lines) {
            Ok(lines) => run_in_transaction(&self.store, move |tx| {
                Box::pin(place_in(tx, user_id, lines))
            })
            .await
            .map_err(DomainError::from),
            Err(e) => Err(e.into()),
        };

        metrics::histogram!("order_placement_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(placed) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %placed.order.id,
                    total = %placed.order.total,
                    "order placed"
                );
            }
            Err(e) if e.is_business() => {
                metrics::counter!("orders_rejected_total").increment(1);
                tracing::warn!(error = %e, "order rejected");
            }
            Err(e) => tracing::error!(error = %e, "order placement failed"),
        }

        result
    }

    /// Cancels a pending order on behalf of its owner, returning its stock.
    ///
    /// Orders owned by someone else are reported as not found.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        actor: Actor,
        order_id: OrderId,
    ) -> Result<PlacedOrder, DomainError> {
        self.transition(Authority::Owner(actor.user_id), order_id, OrderStatus::Cancelled)
            .await
    }

    /// Moves an order to `target` as an administrator.
    ///
    /// Leaving a stock-holding status returns every line to stock; entering
    /// one from `Cancelled` takes the stock again, subject to the same
    /// sufficiency check as placement.
    #[tracing::instrument(skip(self))]
    pub async fn set_status(
        &self,
        actor: Actor,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<PlacedOrder, DomainError> {
        if !actor.is_admin {
            return Err(OrderError::Forbidden("changing order status requires admin").into());
        }
        self.transition(Authority::Admin, order_id, target).await
    }

    /// Lists a user's orders with their line items, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<PlacedOrder>, DomainError> {
        run_in_transaction(&self.store, move |tx| {
            Box::pin(async move {
                let orders = tx.orders_for_user(user_id).await?;
                let mut placed = Vec::with_capacity(orders.len());
                for order in orders {
                    let items = tx.line_items_for_order(order.id).await?;
                    placed.push(PlacedOrder { order, items });
                }
                Ok::<_, DomainError>(placed)
            })
        })
        .await
        .map_err(DomainError::from)
    }

    async fn transition(
        &self,
        authority: Authority,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<PlacedOrder, DomainError> {
        let (placed, effect) = run_in_transaction(&self.store, move |tx| {
            Box::pin(transition_in(tx, authority, order_id, target))
        })
        .await
        .map_err(DomainError::from)
        .inspect_err(|e| tracing::warn!(error = %e, "order transition failed"))?;

        metrics::counter!("order_status_transitions_total", "to" => target.as_str()).increment(1);
        if effect != StockEffect::None {
            metrics::counter!("stock_compensations_total", "kind" => effect.as_str())
                .increment(1);
        }
        tracing::info!(
            order_id = %order_id,
            status = %placed.order.status,
            stock = effect.as_str(),
            "order transitioned"
        );

        Ok(placed)
    }
}

/// Validates quantities and merges lines that name the same product,
/// keeping first-appearance order.
fn coalesce(lines: Vec<OrderLine>) -> Result<Vec<OrderLine>, OrderError> {
    if lines.is_empty() {
        return Err(OrderError::EmptyItems);
    }

    let mut merged: Vec<OrderLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity <= 0 {
            return Err(OrderError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity.into(),
            });
        }

        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => {
                let sum = i64::from(existing.quantity) + i64::from(line.quantity);
                existing.quantity =
                    i32::try_from(sum).map_err(|_| OrderError::QuantityTooLarge {
                        product_id: line.product_id,
                        quantity: sum,
                    })?;
            }
            None => merged.push(line),
        }
    }

    Ok(merged)
}

/// Locks the requested products and checks every line against their stock.
///
/// Returns each line paired with its product, in line order.
async fn lock_and_check<T: Transaction>(
    tx: &mut T,
    lines: &[OrderLine],
) -> Result<Vec<(OrderLine, Product)>, DomainError> {
    let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
    let products: HashMap<ProductId, Product> = tx
        .get_products(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut rejections = BTreeMap::new();
    let mut checked = Vec::with_capacity(lines.len());
    for line in lines {
        match products.get(&line.product_id) {
            None => {
                rejections.insert(line.product_id, ItemRejection::ProductNotFound);
            }
            Some(product) if product.stock < line.quantity => {
                rejections.insert(
                    line.product_id,
                    ItemRejection::InsufficientStock {
                        requested: line.quantity,
                        available: product.stock,
                    },
                );
            }
            Some(product) => checked.push((*line, product.clone())),
        }
    }

    if !rejections.is_empty() {
        return Err(OrderError::ItemsRejected(rejections).into());
    }
    Ok(checked)
}

async fn place_in<T: Transaction>(
    tx: &mut T,
    user_id: UserId,
    lines: Vec<OrderLine>,
) -> Result<PlacedOrder, DomainError> {
    let checked = lock_and_check(tx, &lines).await?;

    let order_id = OrderId::new();
    let mut rejections = BTreeMap::new();
    let mut items = Vec::with_capacity(checked.len());
    for (line, product) in &checked {
        match product.price.line_total(line.quantity) {
            Some(price) => items.push(OrderLineItem {
                id: LineItemId::new(),
                order_id,
                product_id: line.product_id,
                quantity: line.quantity,
                price,
            }),
            None => {
                rejections.insert(line.product_id, ItemRejection::AmountTooLarge);
            }
        }
    }
    if !rejections.is_empty() {
        return Err(OrderError::ItemsRejected(rejections).into());
    }

    // Lines are rounded individually; the total is the sum of rounded lines.
    let total = items
        .iter()
        .try_fold(Money::zero(), |acc, item| acc.checked_add(item.price))
        .ok_or(OrderError::TotalTooLarge {
            limit: Money::max_total(),
        })?;

    let order = tx
        .insert_order(&NewOrder {
            id: order_id,
            user_id,
            total,
        })
        .await?;
    tx.insert_line_items(&items).await?;

    for item in &items {
        tx.adjust_stock(item.product_id, -item.quantity).await?;
    }

    Ok(PlacedOrder { order, items })
}

async fn transition_in<T: Transaction>(
    tx: &mut T,
    authority: Authority,
    order_id: OrderId,
    target: OrderStatus,
) -> Result<(PlacedOrder, StockEffect), DomainError> {
    let order = match tx.get_order(order_id).await {
        Ok(order) => order,
        Err(e) if e.is_not_found() => return Err(OrderError::OrderNotFound(order_id).into()),
        Err(e) => return Err(e.into()),
    };

    if let Authority::Owner(user_id) = authority {
        if order.user_id != user_id {
            return Err(OrderError::OrderNotFound(order_id).into());
        }
        if !order.status.can_cancel() {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: target,
            }
            .into());
        }
    }

    let mut items = tx.line_items_for_order(order_id).await?;
    items.sort_by_key(|item| item.product_id);

    let effect = StockEffect::between(order.status, target);
    if effect == StockEffect::Consume && !items.is_empty() {
        let lines = coalesce(
            items
                .iter()
                .map(|item| OrderLine::new(item.product_id, item.quantity))
                .collect(),
        )?;
        lock_and_check(tx, &lines).await?;
    }
    if effect != StockEffect::None {
        for item in &items {
            tx.adjust_stock(item.product_id, effect.sign() * item.quantity)
                .await?;
        }
    }

    let order = if order.status == target {
        order
    } else {
        tx.update_order_status(order_id, target).await?
    };

    Ok((PlacedOrder { order, items }, effect))
}
