//! Unit-of-work executor.

use futures_util::future::BoxFuture;

use crate::error::TxError;
use crate::store::{Store, Transaction};

/// Runs `work` inside a single transaction.
///
/// Every repository call made by `work` goes through the transaction handle
/// it is given. If `work` succeeds the transaction is committed; if it fails
/// the transaction is rolled back and the error is returned as
/// [`TxError::Work`]. Begin and commit failures are [`TxError::Commit`]; a
/// failed rollback keeps both errors in [`TxError::Rollback`].
///
/// ```ignore
/// let order = run_in_transaction(&store, |tx| {
///     Box::pin(async move { tx.get_order(order_id).await })
/// })
/// .await?;
/// ```
pub async fn run_in_transaction<S, T, E, F>(store: &S, work: F) -> Result<T, TxError<E>>
where
    S: Store + ?Sized,
    F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, Result<T, E>> + Send,
    T: Send,
    E: Send,
{
    let mut tx = store.begin().await.map_err(TxError::Commit)?;

    match work(&mut tx).await {
        Ok(value) => {
            tx.commit().await.map_err(TxError::Commit)?;
            Ok(value)
        }
        Err(work) => match tx.rollback().await {
            Ok(()) => {
                tracing::debug!("unit of work rolled back");
                Err(TxError::Work(work))
            }
            Err(source) => {
                tracing::error!(error = %source, "rollback failed");
                Err(TxError::Rollback { work, source })
            }
        },
    }
}
