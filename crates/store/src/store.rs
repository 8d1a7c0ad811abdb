use async_trait::async_trait;
use common::{OrderId, OrderStatus, ProductId, UserId};

use crate::{NewOrder, NewProduct, Order, OrderLineItem, Product, ProductChanges, Result};

/// Read/write access to product stock.
///
/// Stock is only ever mutated through [`InventoryRepository::adjust_stock`],
/// a signed delta, so concurrent adjustments compose under the storage
/// engine's row locking.
#[async_trait]
pub trait InventoryRepository: Send {
    /// Fetches one product. A missing id is [`crate::StoreError::NotFound`].
    async fn get_product(&mut self, id: ProductId) -> Result<Product>;

    /// Fetches the subset of `ids` that exist, locking their rows until the
    /// transaction ends.
    ///
    /// Callers diff the requested ids against the result to find missing
    /// products. Rows come back ordered by id.
    async fn get_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Adds `delta` to a product's stock (negative consumes, positive
    /// restocks) and returns the updated row.
    ///
    /// A delta that would leave stock negative is a
    /// [`crate::StoreError::Conflict`].
    async fn adjust_stock(&mut self, id: ProductId, delta: i32) -> Result<Product>;
}

/// Catalog maintenance, used by admin product management.
#[async_trait]
pub trait CatalogRepository: Send {
    /// Inserts a product. A duplicate name is a conflict.
    async fn insert_product(&mut self, product: &NewProduct) -> Result<Product>;

    /// Lists every product, oldest first.
    async fn list_products(&mut self) -> Result<Vec<Product>>;

    /// Replaces a product's editable fields.
    async fn update_product(&mut self, id: ProductId, changes: &ProductChanges) -> Result<Product>;

    /// Deletes a product. A product referenced by an order line is a conflict.
    async fn delete_product(&mut self, id: ProductId) -> Result<()>;
}

/// Read/write access to orders and their line items.
#[async_trait]
pub trait OrderRepository: Send {
    /// Inserts a new order header with status pending.
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order>;

    /// Inserts all line items of one order in a single statement.
    async fn insert_line_items(&mut self, items: &[OrderLineItem]) -> Result<()>;

    /// Fetches one order, locking it until the transaction ends.
    async fn get_order(&mut self, id: OrderId) -> Result<Order>;

    /// Lists a user's orders, newest first.
    async fn orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>>;

    /// Writes an order's status. A missing id is not-found.
    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<Order>;

    /// Fetches every line item of an order.
    async fn line_items_for_order(&mut self, id: OrderId) -> Result<Vec<OrderLineItem>>;
}

/// A transaction-scoped handle exposing every repository.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait Transaction: InventoryRepository + OrderRepository + CatalogRepository + Sized {
    /// Makes every write of the transaction visible.
    async fn commit(self) -> Result<()>;

    /// Discards every write of the transaction.
    async fn rollback(self) -> Result<()>;
}

/// A transactional store.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    /// The transaction handle type.
    type Tx: Transaction;

    /// Begins a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}
