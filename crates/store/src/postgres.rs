use async_trait::async_trait;
use common::{LineItemId, Money, OrderId, OrderStatus, ProductId, UserId};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CatalogRepository, InventoryRepository, NewOrder, NewProduct, Order, OrderLineItem,
    OrderRepository, Product, ProductChanges, Result, Store, StoreError, Transaction,
};

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }
}

/// Transaction handle of [`PostgresStore`].
///
/// Dropping it without committing rolls the transaction back.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::new(row.try_get::<Decimal, _>("price")?),
        stock: row.try_get("stock")?,
        created_by: UserId::from_uuid(row.try_get::<Uuid, _>("created_by")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        total: Money::new(row.try_get::<Decimal, _>("total")?),
        status: status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Decode(e.to_string()))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_line_item(row: PgRow) -> Result<OrderLineItem> {
    Ok(OrderLineItem {
        id: LineItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: row.try_get("quantity")?,
        price: Money::new(row.try_get::<Decimal, _>("price")?),
    })
}

/// Maps constraint violations raised by writes to [`StoreError::Conflict`].
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && let Some(constraint) = db_err.constraint()
    {
        let message = match constraint {
            "products_name_key" => "product name already exists",
            "products_stock_non_negative" => "product stock cannot go below zero",
            "order_items_product_id_fkey" => "product is referenced by existing orders",
            "orders_pkey" => "order already exists",
            other => return StoreError::Conflict(format!("constraint violated: {other}")),
        };
        return StoreError::Conflict(message.to_string());
    }
    StoreError::Database(e)
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl InventoryRepository for PostgresTransaction {
    async fn get_product(&mut self, id: ProductId) -> Result<Product> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, price, stock, created_by, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => row_to_product(row),
            None => Err(StoreError::not_found("product", id)),
        }
    }

    async fn get_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();

        // Rows are locked in id order so concurrent placements cannot deadlock.
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price, stock, created_by, created_at, updated_at
            FROM products
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn adjust_stock(&mut self, id: ProductId, delta: i32) -> Result<Product> {
        let row = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, price, stock, created_by, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        match row {
            Some(row) => row_to_product(row),
            None => Err(StoreError::not_found("product", id)),
        }
    }
}

#[async_trait]
impl CatalogRepository for PostgresTransaction {
    async fn insert_product(&mut self, product: &NewProduct) -> Result<Product> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, stock, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, description, price, stock, created_by, created_at, updated_at
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(product.stock)
        .bind(product.created_by.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        row_to_product(row)
    }

    async fn list_products(&mut self) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price, stock, created_by, created_at, updated_at
            FROM products
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn update_product(&mut self, id: ProductId, changes: &ProductChanges) -> Result<Product> {
        let row = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, price = $4, stock = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, price, stock, created_by, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.price.amount())
        .bind(changes.stock)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        match row {
            Some(row) => row_to_product(row),
            None => Err(StoreError::not_found("product", id)),
        }
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("product", id));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PostgresTransaction {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, total, status, created_at, updated_at
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.total.amount())
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        row_to_order(row)
    }

    async fn insert_line_items(&mut self, items: &[OrderLineItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO order_items (id, order_id, product_id, quantity, price) ",
        );
        builder.push_values(items, |mut row, item| {
            row.push_bind(item.id.as_uuid())
                .push_bind(item.order_id.as_uuid())
                .push_bind(item.product_id.as_uuid())
                .push_bind(item.quantity)
                .push_bind(item.price.amount());
        });

        builder
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Order> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, total, status, created_at, updated_at
            FROM orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => row_to_order(row),
            None => Err(StoreError::not_found("order", id)),
        }
    }

    async fn orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, total, status, created_at, updated_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_order).collect()
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let row = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, total, status, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => row_to_order(row),
            None => Err(StoreError::not_found("order", id)),
        }
    }

    async fn line_items_for_order(&mut self, id: OrderId) -> Result<Vec<OrderLineItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, price
            FROM order_items
            WHERE order_id = $1
            ORDER BY product_id
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_line_item).collect()
    }
}
