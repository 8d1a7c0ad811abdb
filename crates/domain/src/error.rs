//! Domain error types.

use std::collections::BTreeMap;

use serde::Serialize;
use store::{StoreError, TxError};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An order operation was rejected.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// A catalog operation was rejected.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// The store failed to read or persist.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The unit of work failed and its rollback failed too.
    #[error("Rollback failed: {source} (after: {cause})")]
    RollbackFailed {
        source: StoreError,
        cause: Box<DomainError>,
    },
}

impl DomainError {
    /// Returns true for expected, client-correctable rejections.
    ///
    /// A failed rollback is a system failure even when the work itself was
    /// rejected for a business reason.
    pub fn is_business(&self) -> bool {
        match self {
            DomainError::Order(_) | DomainError::Catalog(_) => true,
            DomainError::Store(e) => e.is_not_found(),
            DomainError::RollbackFailed { .. } => false,
        }
    }

    /// Transport-neutral category of the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            DomainError::Order(e) => e.category(),
            DomainError::Catalog(e) => e.category(),
            DomainError::Store(StoreError::NotFound { .. }) => ErrorCategory::NotFound,
            DomainError::Store(StoreError::Conflict(_)) => ErrorCategory::Conflict,
            DomainError::Store(_) | DomainError::RollbackFailed { .. } => ErrorCategory::Storage,
        }
    }

    /// Per-field or per-product details of the error, if any.
    pub fn details(&self) -> BTreeMap<String, String> {
        match self {
            DomainError::Order(e) => e.details(),
            DomainError::Catalog(e) => e.details(),
            _ => BTreeMap::new(),
        }
    }
}

impl From<TxError<DomainError>> for DomainError {
    fn from(e: TxError<DomainError>) -> Self {
        match e {
            TxError::Work(work) => work,
            TxError::Commit(source) => DomainError::Store(source),
            TxError::Rollback { work, source } => DomainError::RollbackFailed {
                source,
                cause: Box::new(work),
            },
        }
    }
}

/// How a caller should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed or unacceptable input.
    Validation,
    /// The target does not exist, or is not visible to the caller.
    NotFound,
    /// The caller lacks the required role.
    Forbidden,
    /// The request clashes with existing data.
    Conflict,
    /// Storage or transaction failure.
    Storage,
}

impl ErrorCategory {
    /// Returns true for failures the client can correct.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ErrorCategory::Storage)
    }
}

/// Error returned by the service layer.
///
/// Storage failures keep their message out of `message` so internals are
/// not echoed to callers; the full error is logged instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub category: ErrorCategory,
    pub message: String,
    pub details: BTreeMap<String, String>,
}

impl ServiceError {
    /// Creates an error without details.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(e: DomainError) -> Self {
        let category = e.category();
        if category.is_client_error() {
            return Self {
                category,
                message: e.to_string(),
                details: e.details(),
            };
        }

        tracing::error!(error = %e, "storage failure");
        ServiceError::new(category, "internal storage error")
    }
}

impl From<OrderError> for ServiceError {
    fn from(e: OrderError) -> Self {
        DomainError::from(e).into()
    }
}

impl From<CatalogError> for ServiceError {
    fn from(e: CatalogError) -> Self {
        DomainError::from(e).into()
    }
}
