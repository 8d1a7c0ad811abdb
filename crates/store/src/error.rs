use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested row does not exist.
    ///
    /// Expected under normal operation (stale id, race with a delete), so it
    /// is kept apart from generic database failures.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness or referential constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be mapped back into a domain type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The store refused the operation (connection lost, injected failure).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Shorthand for a [`StoreError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true for the distinguishable not-found outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Failure of a unit of work run through [`crate::run_in_transaction`].
///
/// Keeps the work-level error (the closure rejected the operation) apart
/// from the commit-level error (storage failed to begin, commit or roll
/// back). When the work fails and the rollback fails too, both are kept.
#[derive(Debug, Error)]
pub enum TxError<E> {
    /// The work returned an error and the transaction was rolled back.
    #[error("{0}")]
    Work(E),

    /// The transaction could not be started or committed.
    #[error("Transaction failed: {0}")]
    Commit(#[source] StoreError),

    /// The work returned an error and the rollback failed as well.
    #[error("Rollback failed ({source}) after: {work}")]
    Rollback {
        work: E,
        #[source]
        source: StoreError,
    },
}

impl<E> TxError<E> {
    /// The work-level error slot.
    pub fn work_error(&self) -> Option<&E> {
        match self {
            TxError::Work(work) | TxError::Rollback { work, .. } => Some(work),
            TxError::Commit(_) => None,
        }
    }

    /// The commit-level error slot.
    pub fn commit_error(&self) -> Option<&StoreError> {
        match self {
            TxError::Commit(source) | TxError::Rollback { source, .. } => Some(source),
            TxError::Work(_) => None,
        }
    }
}
