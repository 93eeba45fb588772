//! Single-lane request queue for the REST upstream.
//!
//! Requests are executed strictly one at a time in FIFO order by a single
//! drain task that owns the queue. After every executed entry the drain task
//! idles for a fixed cooldown, whatever the outcome, so the upstream never
//! sees two calls from this client closer together than the cooldown.
//! Retries (see [`run_with_retry`]) happen inside an entry and keep the lane.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::debug;

use super::error::CatalogError;
use super::retry::{run_with_retry, RetryPolicy};

/// Deferred unit of work; resolves to `false` when it was skipped because the
/// caller stopped waiting
type Job = Box<dyn FnOnce(RetryPolicy) -> BoxFuture<'static, bool> + Send>;

struct QueueEntry {
    label: String,
    job: Job,
}

/// Queue timing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Idle time after each executed entry
    pub cooldown: Duration,
    /// Retry policy applied inside each entry
    pub retry: RetryPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(1000),
            retry: RetryPolicy::default(),
        }
    }
}

/// Handle to a single-lane request queue
///
/// Each handle owns its own drain task, so independent queues can coexist.
/// The drain task exits once the handle is dropped and the backlog is done.
pub struct RequestQueue {
    sender: mpsc::UnboundedSender<QueueEntry>,
    pending: Arc<AtomicUsize>,
    config: QueueConfig,
}

impl RequestQueue {
    /// Create a queue and spawn its drain task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: QueueConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        tokio::spawn(drain(receiver, config, pending.clone()));

        debug!(
            cooldown_ms = config.cooldown.as_millis() as u64,
            max_retries = config.retry.max_retries,
            "Request queue started"
        );

        Self {
            sender,
            pending,
            config,
        }
    }

    pub fn config(&self) -> QueueConfig {
        self.config
    }

    /// Entries enqueued and not yet settled
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Enqueue one request and wait for its settled result.
    ///
    /// `thunk` performs a single HTTP call; it is invoked again for every
    /// retry. The result arrives after any internal retries; on exhaustion
    /// the last error is returned.
    pub async fn enqueue<T, F, Fut>(
        &self,
        label: impl Into<String>,
        thunk: F,
    ) -> Result<T, CatalogError>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CatalogError>> + Send + 'static,
    {
        let label = label.into();
        let (result_tx, result_rx) = oneshot::channel();

        let job_label = label.clone();
        let job: Job = Box::new(move |policy| {
            async move {
                if result_tx.is_closed() {
                    debug!(label = %job_label, "Caller gone, skipping queued request");
                    return false;
                }
                let result = run_with_retry(policy, &job_label, thunk).await;
                // the caller may have stopped waiting meanwhile
                let _ = result_tx.send(result);
                true
            }
            .boxed()
        });

        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(QueueEntry { label, job }).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(CatalogError::QueueClosed);
        }

        result_rx.await.map_err(|_| CatalogError::QueueClosed)?
    }
}

async fn drain(
    mut receiver: mpsc::UnboundedReceiver<QueueEntry>,
    config: QueueConfig,
    pending: Arc<AtomicUsize>,
) {
    while let Some(entry) = receiver.recv().await {
        debug!(
            label = %entry.label,
            pending = pending.load(Ordering::SeqCst),
            "Dequeued request"
        );

        let executed = (entry.job)(config.retry).await;
        pending.fetch_sub(1, Ordering::SeqCst);

        if executed {
            sleep(config.cooldown).await;
        }
    }

    debug!("Request queue closed");
}
