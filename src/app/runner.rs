use futures_util::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Run `task` over every item with at most `limit` in flight.
///
/// Results come back in input order. A limit of 0 is treated as 1.
pub async fn run_bounded<T, F, Fut>(items: Vec<T>, limit: usize, task: F) -> Vec<Fut::Output>
where
    F: Fn(T) -> Fut,
    Fut: Future,
{
    let permits = Arc::new(Semaphore::new(limit.max(1)));

    let jobs = items.into_iter().map(|item| {
        let permits = permits.clone();
        let job = task(item);
        async move {
            // the semaphore is never closed
            let _permit = permits.acquire().await.ok();
            job.await
        }
    });

    join_all(jobs).await
}
