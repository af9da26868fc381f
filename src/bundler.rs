//! The caller-facing facade: correlation-ID multiplexing of bundle requests
//! over the worker's single duplex channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::channel::oneshot;
use futures_util::SinkExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::error::SubmitError;
use crate::pool::WorkerPool;
use crate::protocol::{BundleResult, SourceFile, WorkerMessage};
use crate::worker::WorkerHandle;

lazy_static! {
    pub static ref TOKIO_RUNTIME: tokio::runtime::Runtime =
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("Failed to construct tokio runtime");
}

// Correlation IDs are process-wide so sibling facades sharing one worker can
// never collide; an ID is never reused.
static NEXT_CORRELATION_ID: AtomicU64 = AtomicU64::new(1);

type PendingTable = Arc<Mutex<HashMap<u64, oneshot::Sender<BundleResult>>>>;

/// Submits bundle requests to the shared worker for one framework-runtime
/// location and resolves each response against the matching pending request.
///
/// Several facades may target the same worker; responses carrying an ID this
/// facade never issued are ignored, since they belong to a sibling.
pub struct Bundler {
    worker: WorkerHandle,
    pending: PendingTable,
    router: CancellationToken,
}

impl Bundler {
    pub fn new(
        pool: &WorkerPool,
        framework_runtime_url: &str,
        bundler_engine_url: &str,
    ) -> Self {
        let worker = pool.worker_for(framework_runtime_url, bundler_engine_url);
        let pending: PendingTable = Arc::default();
        let router = CancellationToken::new();

        let mut responses = worker.resp_tx.subscribe();
        TOKIO_RUNTIME.spawn({
            let pending = Arc::clone(&pending);
            let router = router.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = router.cancelled() => break,
                        received = responses.recv() => match received {
                            Ok(result) => {
                                let resolver = pending
                                    .lock()
                                    .expect("pending request table poisoned")
                                    .remove(&result.id);
                                if let Some(resolver) = resolver {
                                    // receiver may have been dropped by a
                                    // timeout or cancellation wrapper
                                    let _ = resolver.send(result);
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                log::warn!("dropped {} bundle responses", skipped);
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        },
                    }
                }
            }
        });

        Self {
            worker,
            pending,
            router,
        }
    }

    /// Submits one bundle request and suspends until the matching response.
    ///
    /// An empty `components` list is a no-op on the worker side: the returned
    /// future stays pending until the facade is destroyed. There is no
    /// implicit retry or timeout; see [`Bundler::submit_with_timeout`].
    pub async fn submit(
        &self,
        components: Vec<SourceFile>,
    ) -> Result<BundleResult, SubmitError> {
        let id = NEXT_CORRELATION_ID.fetch_add(1, Ordering::Relaxed);
        let (resolver, response) = oneshot::channel();
        self.pending
            .lock()
            .expect("pending request table poisoned")
            .insert(id, resolver);

        let mut sender = self.worker.msg_tx.clone();
        let message = WorkerMessage::Bundle { id, components };
        if sender.send(message).await.is_err() {
            self.pending
                .lock()
                .expect("pending request table poisoned")
                .remove(&id);
            return Err(SubmitError::WorkerUnavailable);
        }

        response.await.map_err(|_| SubmitError::Cancelled)
    }

    /// [`Bundler::submit`] with a facade-layer deadline. The worker protocol
    /// is unchanged; a late response is simply ignored.
    pub async fn submit_with_timeout(
        &self,
        components: Vec<SourceFile>,
        timeout: Duration,
    ) -> Result<BundleResult, SubmitError> {
        match tokio::time::timeout(timeout, self.submit(components)).await {
            Ok(result) => result,
            Err(_) => Err(SubmitError::TimedOut),
        }
    }

    /// [`Bundler::submit`] that gives up when `token` fires. The request
    /// itself cannot be aborted once dispatched; its eventual response is
    /// ignored.
    pub async fn submit_with_cancellation(
        &self,
        components: Vec<SourceFile>,
        token: &CancellationToken,
    ) -> Result<BundleResult, SubmitError> {
        tokio::select! {
            _ = token.cancelled() => Err(SubmitError::Cancelled),
            result = self.submit(components) => result,
        }
    }

    /// Unconditionally terminates the background worker, without draining
    /// in-flight requests, and rejects this facade's pending requests with
    /// [`SubmitError::Cancelled`].
    pub fn destroy(&self) {
        self.worker.shutdown.cancel();
        self.router.cancel();
        // dropping the resolvers rejects the pending futures
        self.pending
            .lock()
            .expect("pending request table poisoned")
            .clear();
    }
}

impl Drop for Bundler {
    fn drop(&mut self) {
        // stop routing; the shared worker stays alive for sibling facades
        self.router.cancel();
    }
}
