use std::future::Future;

use crate::database::store::StoreTx;
use crate::error::AppResult;

/// Commits `tx` when `result` is `Ok`, otherwise rolls it back and returns the error.
pub async fn finish<Tx, T>(tx: Tx, result: AppResult<T>) -> AppResult<T>
where
    Tx: StoreTx,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            log::warn!("Transaction failed with error: {}, rolling back", err);
            if let Err(rollback_err) = tx.rollback().await {
                log::error!(
                    "Rollback failed after error (orig: {}, rollback: {})",
                    err,
                    rollback_err
                );
            }
            Err(err)
        }
    }
}

/// Runs `op` and, if it fails with a consistency fault, runs it exactly once more.
pub async fn retry_on_conflict<T, F, Fut>(label: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    match op().await {
        Err(err) if err.is_consistency_fault() => {
            log::warn!("{} hit a consistency fault ({}), retrying once", label, err);
            op().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::cell::Cell;

    #[tokio::test]
    async fn retries_consistency_fault_once() {
        let calls = Cell::new(0);
        let result = retry_on_conflict("test", || {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move {
                if attempt == 1 {
                    Err(AppError::Consistency("race".to_string()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn does_not_retry_business_errors() {
        let calls = Cell::new(0);
        let result: AppResult<()> = retry_on_conflict("test", || {
            calls.set(calls.get() + 1);
            async { Err(AppError::AlreadyCheckedIn) }
        })
        .await;

        assert!(matches!(result, Err(AppError::AlreadyCheckedIn)));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_second_fault() {
        let calls = Cell::new(0);
        let result: AppResult<()> = retry_on_conflict("test", || {
            calls.set(calls.get() + 1);
            async { Err(AppError::Consistency("race".to_string())) }
        })
        .await;

        assert!(result.unwrap_err().is_consistency_fault());
        assert_eq!(calls.get(), 2);
    }
}
