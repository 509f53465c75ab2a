//! Fan-out join strategies.
//!
//! Two strategies exist on purpose and callers depend on the difference:
//!
//! - [`exhaustive_join`] waits for every branch, then reports the first
//!   error. Used for table lifecycle over the whole registry.
//! - [`eager_abort`] stops at the first error and discards partial results.
//!   Used for file-list resolution.

use std::future::Future;

use futures::future::{join_all, try_join_all};

/// Run every future to completion; return all values, or the first error
/// (in input order) once every branch has finished.
pub async fn exhaustive_join<I, F, T, E>(branches: I) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let mut values = Vec::new();
    let mut first_error = None;
    for result in join_all(branches).await {
        match result {
            Ok(value) => values.push(value),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(values),
    }
}

/// Run futures concurrently; the first error aborts the rest.
pub async fn eager_abort<I, F, T, E>(branches: I) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    try_join_all(branches).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn exhaustive_join_runs_every_branch() {
        let finished = Arc::new(AtomicUsize::new(0));
        let branches = (0..4).map(|i| {
            let finished = Arc::clone(&finished);
            async move {
                if i == 0 {
                    return Err(format!("branch {i} failed"));
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            }
        });

        let err = exhaustive_join(branches).await.unwrap_err();
        assert_eq!(err, "branch 0 failed");
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustive_join_reports_first_error_in_order() {
        let branches = vec![
            futures::future::ready(Ok::<_, &str>(1)),
            futures::future::ready(Err("second")),
            futures::future::ready(Err("third")),
        ];
        assert_eq!(exhaustive_join(branches).await.unwrap_err(), "second");
    }

    #[tokio::test]
    async fn eager_abort_stops_at_first_error() {
        let finished = Arc::new(AtomicUsize::new(0));
        let branches = (0..4).map(|i| {
            let finished = Arc::clone(&finished);
            async move {
                if i == 0 {
                    return Err("boom");
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            }
        });

        assert_eq!(eager_abort(branches).await.unwrap_err(), "boom");
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn both_strategies_agree_on_success() {
        let make = || (1..=3).map(|i| futures::future::ready(Ok::<_, ()>(i)));
        assert_eq!(exhaustive_join(make()).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(eager_abort(make()).await.unwrap(), vec![1, 2, 3]);
    }
}
