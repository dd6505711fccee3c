use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Coalesces bursts of triggers into one handler call.
///
/// The handler runs once the input has been quiet for `window`. Values sent
/// within one burst are folded with the merge function; [`Debouncer::new`]
/// keeps the last one. Dropping the debouncer flushes a pending value and
/// stops the task.
pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new<F, Fut>(window: Duration, handler: F) -> Self
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        Self::with_merge(window, |_, next| next, handler)
    }

    /// Fold every value of a burst with `merge(pending, next)`
    pub fn with_merge<M, F, Fut>(window: Duration, mut merge: M, mut handler: F) -> Self
    where
        M: FnMut(T, T) -> T + Send + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<T>();

        let task = tokio::spawn(async move {
            while let Some(mut latest) = rx.recv().await {
                loop {
                    match tokio::time::timeout(window, rx.recv()).await {
                        Ok(Some(next)) => latest = merge(latest, next),
                        // quiet for a full window, or the sender is gone
                        Ok(None) | Err(_) => break,
                    }
                }
                handler(latest).await;
            }
        });

        Self { tx, task }
    }

    pub fn trigger(&self, value: T) {
        if self.tx.send(value).is_err() {
            log::warn!("Debounce task has stopped");
        }
    }

    /// Flush anything pending and wait for the handler to finish
    pub async fn close(self) {
        let Self { tx, task } = self;
        drop(tx);
        if let Err(e) = task.await {
            log::error!("Debounce task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::RateLimiter;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, Debouncer<u32>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let debouncer = Debouncer::new(Duration::from_millis(50), move |v| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(v);
            }
        });
        (seen, debouncer)
    }

    #[tokio::test]
    async fn test_burst_is_coalesced() {
        let (seen, debouncer) = recorder();
        for v in 1..=5 {
            debouncer.trigger(v);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*seen.lock().unwrap(), vec![5]);

        debouncer.trigger(9);
        debouncer.close().await;
        assert_eq!(*seen.lock().unwrap(), vec![5, 9]);
    }

    #[tokio::test]
    async fn test_separate_bursts() {
        let (seen, debouncer) = recorder();
        debouncer.trigger(1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        debouncer.trigger(2);
        debouncer.close().await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_merged_flag_survives_later_values() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let limiter = Arc::new(RateLimiter::new(chrono::Duration::minutes(30)));
        let (sink, gate) = (seen.clone(), limiter.clone());
        let debouncer = Debouncer::with_merge(
            Duration::from_millis(50),
            |pending: bool, next| pending || next,
            move |servers_changed| {
                let refresh = servers_changed && gate.check_and_set("speed-test");
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(refresh);
                }
            },
        );

        // server edit, then an unrelated edit inside the same window
        debouncer.trigger(true);
        debouncer.trigger(false);
        debouncer.close().await;

        assert_eq!(*seen.lock().unwrap(), vec![true]);
        assert!(!limiter.check_and_set("speed-test"));
    }

    #[tokio::test]
    async fn test_limiter_untouched_without_server_edit() {
        let limiter = Arc::new(RateLimiter::new(chrono::Duration::minutes(30)));
        let gate = limiter.clone();
        let debouncer = Debouncer::with_merge(
            Duration::from_millis(50),
            |pending: bool, next| pending || next,
            move |servers_changed| {
                let _ = servers_changed && gate.check_and_set("speed-test");
                async {}
            },
        );

        debouncer.trigger(false);
        debouncer.trigger(false);
        debouncer.close().await;

        assert!(limiter.check_and_set("speed-test"));
    }
}
