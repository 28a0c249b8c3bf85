//! Batch write coordinator
//!
//! Applies create/update operations item by item with no transactional
//! guarantee across the batch: a failure on one item records an error and
//! moves on, and every successful item carries its own watermark stamp from
//! the moment it committed. Callers must inspect `errors` rather than rely
//! on a request-level failure code.

use serde::Serialize;

use super::envelope::{BatchError, BatchOutcome};
use crate::error::{Result, SyncError};
use crate::types::MAX_BATCH_ITEMS;

/// Apply `op` to every item independently
///
/// The batch length is bounded up front; an oversized batch is rejected
/// before any item is processed. Each `op` invocation reads its own clock
/// when stamping, so sibling items get distinct watermarks.
pub fn apply_batch<I, T, F>(items: &[I], mut op: F) -> Result<BatchOutcome<T>>
where
    I: Serialize,
    F: FnMut(&I) -> Result<T>,
{
    if items.len() > MAX_BATCH_ITEMS {
        return Err(SyncError::validation(format!(
            "Batch cannot exceed {} items (got {})",
            MAX_BATCH_ITEMS,
            items.len()
        )));
    }

    let mut succeeded = Vec::new();
    let mut errors = Vec::new();

    for item in items {
        match op(item) {
            Ok(entity) => succeeded.push(entity),
            Err(err) => {
                tracing::debug!(error = %err, "batch item failed");
                errors.push(BatchError {
                    item: serde_json::to_value(item).unwrap_or(serde_json::Value::Null),
                    error: err.to_string(),
                });
            }
        }
    }

    Ok(BatchOutcome {
        count: succeeded.len(),
        succeeded,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_keeps_siblings() {
        let items = vec![1, 2, 3, 4, 5];
        let outcome = apply_batch(&items, |&n| {
            if n == 3 {
                Err(SyncError::validation("three is invalid"))
            } else {
                Ok(n * 10)
            }
        })
        .unwrap();

        assert_eq!(outcome.succeeded, vec![10, 20, 40, 50]);
        assert_eq!(outcome.count, 4);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].item, serde_json::json!(3));
        assert!(outcome.errors[0].error.contains("three is invalid"));
    }

    #[test]
    fn test_empty_batch() {
        let items: Vec<i32> = vec![];
        let outcome = apply_batch(&items, |&n| Ok::<_, SyncError>(n)).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.count, 0);
    }

    #[test]
    fn test_oversized_batch_rejected_before_processing() {
        let items: Vec<i32> = (0..=MAX_BATCH_ITEMS as i32).collect();
        let mut processed = 0;
        let result = apply_batch(&items, |&n| {
            processed += 1;
            Ok::<_, SyncError>(n)
        });
        assert!(matches!(result, Err(SyncError::Validation(_))));
        assert_eq!(processed, 0);
    }
}
