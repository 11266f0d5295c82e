//! Work that must outlive the request that started it.
//!
//! Every task registered with [`Lifetime::wait_until`] runs on its own tokio
//! task, so dropping the caller (an HTTP client hanging up mid-response)
//! never interrupts a cache write. Shutdown awaits [`Lifetime::drained`].

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashcache_core::Error;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    pending: AtomicUsize,
    idle: Notify,
}

/// Tracker for in-flight worker tasks.
#[derive(Debug, Clone, Default)]
pub struct Lifetime {
    inner: Arc<Inner>,
}

/// Decrements the pending count when the tracked task finishes, however it
/// finishes.
struct Pending(Arc<Inner>);

impl Drop for Pending {
    fn drop(&mut self) {
        if self.0.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl Lifetime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked tasks still running.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Run `work` as a tracked task and wait for its result.
    ///
    /// # Errors
    ///
    /// Returns `Error::TaskFailed` if the task panicked or the runtime
    /// cancelled it.
    pub async fn wait_until<F>(&self, work: F) -> Result<F::Output, Error>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        let guard = Pending(Arc::clone(&self.inner));

        let handle = tokio::spawn(async move {
            let _guard = guard;
            work.await
        });

        handle.await.map_err(|e| Error::TaskFailed(e.to_string()))
    }

    /// Resolve once no tracked task is running.
    pub async fn drained(&self) {
        loop {
            let idle = self.inner.idle.notified();
            if self.pending() == 0 {
                return;
            }
            idle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_wait_until_returns_output() {
        let lifetime = Lifetime::new();
        let value = lifetime.wait_until(async { 21 * 2 }).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(lifetime.pending(), 0);
    }

    #[tokio::test]
    async fn test_work_survives_dropped_caller() {
        let lifetime = Lifetime::new();
        let (done_tx, done_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let caller = {
            let lifetime = lifetime.clone();
            tokio::spawn(async move {
                let _ = lifetime
                    .wait_until(async move {
                        let _ = release_rx.await;
                        let _ = done_tx.send("written");
                    })
                    .await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        caller.abort();
        assert_eq!(lifetime.pending(), 1);

        release_tx.send(()).unwrap();
        assert_eq!(done_rx.await.unwrap(), "written");
        tokio::time::timeout(Duration::from_secs(1), lifetime.drained()).await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported() {
        let lifetime = Lifetime::new();
        let result: Result<(), Error> = lifetime.wait_until(async { panic!("boom") }).await;
        assert!(matches!(result, Err(Error::TaskFailed(_))));
        assert_eq!(lifetime.pending(), 0);
    }

    #[tokio::test]
    async fn test_drained_when_idle() {
        tokio::time::timeout(Duration::from_millis(100), Lifetime::new().drained()).await.unwrap();
    }
}
