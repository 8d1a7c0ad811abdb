use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{Money, OrderId, OrderStatus, ProductId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    CatalogRepository, InventoryRepository, NewOrder, NewProduct, Order, OrderLineItem,
    OrderRepository, Product, ProductChanges, Result, Store, StoreError, Transaction,
};

#[derive(Debug, Clone, Default)]
struct StoreState {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    line_items: Vec<OrderLineItem>,
}

/// In-memory store implementation for testing and local runs.
///
/// Transactions are serialized: `begin` holds the store lock until the
/// transaction commits or is dropped, and writes go to a private copy of the
/// state that replaces the shared state only on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    fail_next_commit: Arc<AtomicBool>,
    fail_next_rollback: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next transaction's commit fail with [`StoreError::Unavailable`].
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Makes the next transaction's rollback fail with [`StoreError::Unavailable`].
    pub fn fail_next_rollback(&self) {
        self.fail_next_rollback.store(true, Ordering::SeqCst);
    }

    /// Inserts a product outside of any transaction and returns its id.
    pub async fn seed_product(
        &self,
        name: &str,
        price: Money,
        stock: i32,
        created_by: UserId,
    ) -> ProductId {
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(),
            name: name.to_string(),
            description: format!("{name} description"),
            price,
            stock,
            created_by,
            created_at: now,
            updated_at: now,
        };
        let id = product.id;
        self.state.lock().await.products.insert(id, product);
        id
    }

    /// Returns the committed stock of a product.
    pub async fn stock_of(&self, id: ProductId) -> Option<i32> {
        self.state.lock().await.products.get(&id).map(|p| p.stock)
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Returns the number of committed line items.
    pub async fn line_item_count(&self) -> usize {
        self.state.lock().await.line_items.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            fail_commit: self.fail_next_commit.swap(false, Ordering::SeqCst),
            fail_rollback: self.fail_next_rollback.swap(false, Ordering::SeqCst),
        })
    }
}

/// Transaction handle of [`InMemoryStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
    fail_commit: bool,
    fail_rollback: bool,
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(mut self) -> Result<()> {
        if self.fail_commit {
            return Err(StoreError::Unavailable("commit failed".to_string()));
        }
        *self.guard = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        if self.fail_rollback {
            return Err(StoreError::Unavailable("rollback failed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryRepository for InMemoryTransaction {
    async fn get_product(&mut self, id: ProductId) -> Result<Product> {
        self.working
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("product", id))
    }

    async fn get_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let mut products: Vec<_> = self
            .working
            .products
            .values()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect();
        products.sort_by_key(|p| p.id);
        Ok(products)
    }

    async fn adjust_stock(&mut self, id: ProductId, delta: i32) -> Result<Product> {
        let product = self
            .working
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("product", id))?;

        let stock = product
            .stock
            .checked_add(delta)
            .filter(|stock| *stock >= 0)
            .ok_or_else(|| {
                StoreError::Conflict(format!("stock of product {id} cannot go below zero"))
            })?;

        product.stock = stock;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }
}

#[async_trait]
impl CatalogRepository for InMemoryTransaction {
    async fn insert_product(&mut self, product: &NewProduct) -> Result<Product> {
        if self
            .working
            .products
            .values()
            .any(|p| p.name == product.name)
        {
            return Err(StoreError::Conflict(format!(
                "product name already exists: {}",
                product.name
            )));
        }

        let now = Utc::now();
        let row = Product {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            stock: product.stock,
            created_by: product.created_by,
            created_at: now,
            updated_at: now,
        };
        self.working.products.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_products(&mut self) -> Result<Vec<Product>> {
        let mut products: Vec<_> = self.working.products.values().cloned().collect();
        products.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn update_product(&mut self, id: ProductId, changes: &ProductChanges) -> Result<Product> {
        if self
            .working
            .products
            .values()
            .any(|p| p.id != id && p.name == changes.name)
        {
            return Err(StoreError::Conflict(format!(
                "product name already exists: {}",
                changes.name
            )));
        }
        if changes.stock < 0 {
            return Err(StoreError::Conflict(format!(
                "stock of product {id} cannot go below zero"
            )));
        }

        let product = self
            .working
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("product", id))?;
        product.name = changes.name.clone();
        product.description = changes.description.clone();
        product.price = changes.price;
        product.stock = changes.stock;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<()> {
        if !self.working.products.contains_key(&id) {
            return Err(StoreError::not_found("product", id));
        }
        if self.working.line_items.iter().any(|l| l.product_id == id) {
            return Err(StoreError::Conflict(format!(
                "product {id} is referenced by existing orders"
            )));
        }
        self.working.products.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryTransaction {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order> {
        if self.working.orders.contains_key(&order.id) {
            return Err(StoreError::Conflict(format!(
                "order already exists: {}",
                order.id
            )));
        }

        let now = Utc::now();
        let row = Order {
            id: order.id,
            user_id: order.user_id,
            total: order.total,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.working.orders.insert(row.id, row.clone());
        Ok(row)
    }

    async fn insert_line_items(&mut self, items: &[OrderLineItem]) -> Result<()> {
        for item in items {
            if !self.working.orders.contains_key(&item.order_id) {
                return Err(StoreError::Conflict(format!(
                    "line item references unknown order {}",
                    item.order_id
                )));
            }
            if !self.working.products.contains_key(&item.product_id) {
                return Err(StoreError::Conflict(format!(
                    "line item references unknown product {}",
                    item.product_id
                )));
            }
        }
        self.working.line_items.extend_from_slice(items);
        Ok(())
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Order> {
        self.working
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    async fn orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        let mut orders: Vec<_> = self
            .working
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let order = self
            .working
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("order", id))?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn line_items_for_order(&mut self, id: OrderId) -> Result<Vec<OrderLineItem>> {
        Ok(self
            .working
            .line_items
            .iter()
            .filter(|l| l.order_id == id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::LineItemId;

    async fn store_with_product(stock: i32) -> (InMemoryStore, ProductId) {
        let store = InMemoryStore::new();
        let id = store
            .seed_product("Widget", Money::from_cents(1000), stock, UserId::new())
            .await;
        (store, id)
    }

    #[tokio::test]
    async fn get_product_not_found_is_distinguishable() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let err = tx.get_product(ProductId::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn get_products_returns_existing_subset() {
        let (store, id) = store_with_product(5).await;
        let missing = ProductId::new();
        let mut tx = store.begin().await.unwrap();

        let products = tx.get_products(&[id, missing]).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, id);
    }

    #[tokio::test]
    async fn adjust_stock_applies_signed_delta() {
        let (store, id) = store_with_product(5).await;
        let mut tx = store.begin().await.unwrap();

        assert_eq!(tx.adjust_stock(id, -3).await.unwrap().stock, 2);
        assert_eq!(tx.adjust_stock(id, 4).await.unwrap().stock, 6);
        tx.commit().await.unwrap();

        assert_eq!(store.stock_of(id).await, Some(6));
    }

    #[tokio::test]
    async fn adjust_stock_never_goes_negative() {
        let (store, id) = store_with_product(1).await;
        let mut tx = store.begin().await.unwrap();

        let err = tx.adjust_stock(id, -2).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(tx.get_product(id).await.unwrap().stock, 1);
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let (store, id) = store_with_product(5).await;
        {
            let mut tx = store.begin().await.unwrap();
            tx.adjust_stock(id, -5).await.unwrap();
        }
        assert_eq!(store.stock_of(id).await, Some(5));
    }

    #[tokio::test]
    async fn order_round_trip() {
        let (store, product_id) = store_with_product(5).await;
        let user_id = UserId::new();
        let order_id = OrderId::new();
        let mut tx = store.begin().await.unwrap();

        let order = tx
            .insert_order(&NewOrder {
                id: order_id,
                user_id,
                total: Money::from_cents(2000),
            })
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);

        tx.insert_line_items(&[OrderLineItem {
            id: LineItemId::new(),
            order_id,
            product_id,
            quantity: 2,
            price: Money::from_cents(2000),
        }])
        .await
        .unwrap();

        let updated = tx
            .update_order_status(order_id, OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Completed);
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.orders_for_user(user_id).await.unwrap().len(), 1);
        assert_eq!(tx.line_items_for_order(order_id).await.unwrap().len(), 1);
        assert!(tx.orders_for_user(UserId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_status_of_missing_order_is_not_found() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let err = tx
            .update_order_status(OrderId::new(), OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn catalog_rejects_duplicate_names_and_referenced_deletes() {
        let (store, product_id) = store_with_product(5).await;
        let mut tx = store.begin().await.unwrap();

        let duplicate = tx
            .insert_product(&NewProduct {
                id: ProductId::new(),
                name: "Widget".to_string(),
                description: "Another widget".to_string(),
                price: Money::from_cents(100),
                stock: 1,
                created_by: UserId::new(),
            })
            .await;
        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));

        let order_id = OrderId::new();
        tx.insert_order(&NewOrder {
            id: order_id,
            user_id: UserId::new(),
            total: Money::from_cents(1000),
        })
        .await
        .unwrap();
        tx.insert_line_items(&[OrderLineItem {
            id: LineItemId::new(),
            order_id,
            product_id,
            quantity: 1,
            price: Money::from_cents(1000),
        }])
        .await
        .unwrap();

        let delete = tx.delete_product(product_id).await;
        assert!(matches!(delete, Err(StoreError::Conflict(_))));
        assert!(tx.delete_product(ProductId::new()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn transactions_are_serialized() {
        let (store, id) = store_with_product(1).await;

        let mut first = store.begin().await.unwrap();
        first.adjust_stock(id, -1).await.unwrap();

        let second_store = store.clone();
        let second = tokio::spawn(async move {
            let mut tx = second_store.begin().await.unwrap();
            tx.get_product(id).await.unwrap().stock
        });

        tokio::task::yield_now().await;
        assert!(!second.is_finished());

        first.commit().await.unwrap();
        assert_eq!(second.await.unwrap(), 0);
    }
}
