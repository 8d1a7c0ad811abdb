use common::{Money, ProductId};
use store::{
    CatalogRepository, InventoryRepository, NewProduct, Product, ProductChanges, Store,
    StoreError, run_in_transaction,
};

use super::{
    CatalogError, FieldErrors, ProductInput, ProductPatch, validate_patch, validate_product,
};
use crate::actor::Actor;
use crate::error::{DomainError, ServiceError};

/// Service for admin product management.
///
/// Listing is open to any authenticated caller; every other operation
/// requires the admin role. Stock written here is an absolute value set by
/// an administrator, unlike the signed adjustments made by order placement.
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    /// Creates a new catalog service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a product owned by the acting admin.
    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        actor: Actor,
        input: ProductInput,
    ) -> Result<Product, ServiceError> {
        require_admin(actor)?;
        validate_product(&input)?;

        let product = NewProduct {
            id: ProductId::new(),
            stock: to_stock(input.stock)?,
            name: input.name,
            description: input.description,
            price: Money::new(input.price),
            created_by: actor.user_id,
        };

        let created = run_in_transaction(&self.store, move |tx| {
            Box::pin(async move {
                tx.insert_product(&product).await.map_err(|e| match e {
                    StoreError::Conflict(_) => CatalogError::Duplicate(product.name.clone()).into(),
                    other => DomainError::from(other),
                })
            })
        })
        .await
        .map_err(DomainError::from)?;

        tracing::info!(product_id = %created.id, "product created");
        Ok(created)
    }

    /// Lists every product, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self, actor: Actor) -> Result<Vec<Product>, ServiceError> {
        let products = run_in_transaction(&self.store, |tx| {
            Box::pin(async move { tx.list_products().await.map_err(DomainError::from) })
        })
        .await
        .map_err(DomainError::from)?;
        Ok(products)
    }

    /// Fetches one product.
    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, actor: Actor, id: &str) -> Result<Product, ServiceError> {
        require_admin(actor)?;
        let id = parse_product_id(id)?;

        let product = run_in_transaction(&self.store, move |tx| {
            Box::pin(async move { tx.get_product(id).await.map_err(|e| not_found(e, id)) })
        })
        .await
        .map_err(DomainError::from)?;
        Ok(product)
    }

    /// Applies a partial update inside one unit of work.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_product(
        &self,
        actor: Actor,
        id: &str,
        patch: ProductPatch,
    ) -> Result<Product, ServiceError> {
        require_admin(actor)?;
        let id = parse_product_id(id)?;
        validate_patch(&patch)?;
        let stock = patch.stock.map(to_stock).transpose()?;

        let updated = run_in_transaction(&self.store, move |tx| {
            Box::pin(async move {
                let current = tx.get_product(id).await.map_err(|e| not_found(e, id))?;
                let changes = ProductChanges {
                    name: patch.name.unwrap_or(current.name),
                    description: patch.description.unwrap_or(current.description),
                    price: patch.price.map(Money::new).unwrap_or(current.price),
                    stock: stock.unwrap_or(current.stock),
                };

                tx.update_product(id, &changes).await.map_err(|e| match e {
                    StoreError::Conflict(_) => CatalogError::Duplicate(changes.name.clone()).into(),
                    other => not_found(other, id),
                })
            })
        })
        .await
        .map_err(DomainError::from)?;

        tracing::info!(product_id = %id, "product updated");
        Ok(updated)
    }

    /// Deletes a product that no order references.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, actor: Actor, id: &str) -> Result<(), ServiceError> {
        require_admin(actor)?;
        let id = parse_product_id(id)?;

        run_in_transaction(&self.store, move |tx| {
            Box::pin(async move {
                tx.delete_product(id).await.map_err(|e| match e {
                    StoreError::Conflict(_) => CatalogError::InUse(id).into(),
                    other => not_found(other, id),
                })
            })
        })
        .await
        .map_err(DomainError::from)?;

        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }
}

fn require_admin(actor: Actor) -> Result<(), CatalogError> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(CatalogError::Forbidden("product management requires admin"))
    }
}

fn parse_product_id(raw: &str) -> Result<ProductId, CatalogError> {
    raw.trim()
        .parse()
        .map_err(|_| CatalogError::InvalidProductId(raw.to_string()))
}

fn to_stock(stock: i64) -> Result<i32, CatalogError> {
    i32::try_from(stock).map_err(|_| {
        CatalogError::Validation(FieldErrors::from([(
            "stock".to_string(),
            "stock is out of range".to_string(),
        )]))
    })
}

fn not_found(e: StoreError, id: ProductId) -> DomainError {
    if e.is_not_found() {
        CatalogError::ProductNotFound(id).into()
    } else {
        e.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use common::UserId;
    use rust_decimal_macros::dec;
    use store::InMemoryStore;

    fn input(name: &str) -> ProductInput {
        ProductInput {
            name: name.to_string(),
            description: "Something worth selling".to_string(),
            price: dec!(19.99),
            stock: 10,
        }
    }

    fn admin() -> Actor {
        Actor::admin(UserId::new())
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let service = CatalogService::new(InMemoryStore::new());
        let actor = admin();

        let created = service.create_product(actor, input("Widget")).await.unwrap();
        assert_eq!(created.created_by, actor.user_id);
        assert_eq!(created.price, Money::new(dec!(19.99)));

        let fetched = service
            .get_product(actor, &created.id.to_string())
            .await
            .unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_non_admin_is_forbidden() {
        let service = CatalogService::new(InMemoryStore::new());
        let user = Actor::user(UserId::new());

        let err = service.create_product(user, input("Widget")).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Forbidden);

        assert!(service.list_products(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let service = CatalogService::new(InMemoryStore::new());
        service.create_product(admin(), input("Widget")).await.unwrap();

        let err = service
            .create_product(admin(), input("Widget"))
            .await
            .unwrap_err();
        assert_eq!(err.category, ErrorCategory::Conflict);
    }

    #[tokio::test]
    async fn test_invalid_input_reports_fields() {
        let service = CatalogService::new(InMemoryStore::new());
        let mut bad = input("x");
        bad.stock = -3;

        let err = service.create_product(admin(), bad).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Validation);
        assert!(err.details.contains_key("name"));
        assert!(err.details.contains_key("stock"));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_absent_fields() {
        let service = CatalogService::new(InMemoryStore::new());
        let created = service.create_product(admin(), input("Widget")).await.unwrap();

        let updated = service
            .update_product(
                admin(),
                &created.id.to_string(),
                ProductPatch {
                    stock: Some(42),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.stock, 42);
        assert_eq!(updated.name, created.name);
        assert_eq!(updated.price, created.price);
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found() {
        let service = CatalogService::new(InMemoryStore::new());
        let id = ProductId::new().to_string();

        let err = service.get_product(admin(), &id).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::NotFound);

        let err = service.delete_product(admin(), &id).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::NotFound);
    }

    #[tokio::test]
    async fn test_delete_product() {
        let service = CatalogService::new(InMemoryStore::new());
        let created = service.create_product(admin(), input("Widget")).await.unwrap();

        service
            .delete_product(admin(), &created.id.to_string())
            .await
            .unwrap();
        assert!(service.list_products(admin()).await.unwrap().is_empty());
    }
}
