//! Product catalog management.

mod service;
mod validation;

pub use service::CatalogService;
pub use validation::{FieldErrors, validate_patch, validate_product};

use std::collections::BTreeMap;

use common::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorCategory;

/// Fields of a product to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i64,
}

/// Partial product update; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stock: Option<i64>,
}

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// One or more fields failed validation.
    #[error("Invalid product input")]
    Validation(FieldErrors),

    /// A product id could not be parsed.
    #[error("Invalid product id: {0}")]
    InvalidProductId(String),

    /// No product with the given id.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Another product already uses the name.
    #[error("Product already exists: {0}")]
    Duplicate(String),

    /// The product is referenced by existing orders.
    #[error("Product {0} is referenced by existing orders")]
    InUse(ProductId),

    /// The caller lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(&'static str),
}

impl CatalogError {
    pub(crate) fn category(&self) -> ErrorCategory {
        match self {
            CatalogError::Validation(_) | CatalogError::InvalidProductId(_) => {
                ErrorCategory::Validation
            }
            CatalogError::ProductNotFound(_) => ErrorCategory::NotFound,
            CatalogError::Duplicate(_) | CatalogError::InUse(_) => ErrorCategory::Conflict,
            CatalogError::Forbidden(_) => ErrorCategory::Forbidden,
        }
    }

    pub(crate) fn details(&self) -> BTreeMap<String, String> {
        match self {
            CatalogError::Validation(fields) => fields.clone(),
            _ => BTreeMap::new(),
        }
    }
}
