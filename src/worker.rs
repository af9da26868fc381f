//! The worker runtime: one long-lived background thread per distinct
//! framework-runtime location.
//!
//! The thread drives a `LocalSet`, so concurrently accepted requests run as
//! cooperative local tasks that may share the transform and remote-fetch
//! caches through `Rc`/`RefCell` without locking. The first message must be
//! `init`; bundle requests arriving earlier park on a readiness barrier.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use anyhow::Error;
use futures::channel::mpsc;
use futures_util::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::bundler::TOKIO_RUNTIME;
use crate::compiler::ComponentCompiler;
use crate::emit;
use crate::engine::BundlerEngine;
use crate::module_loader::{RemoteFetchCache, TextFetcher, TransformCache};
use crate::protocol::{BundleResult, WorkerMessage};

/// Locations delivered by the `init` message.
#[derive(Debug, Clone)]
pub struct InitOptions {
    pub framework_runtime_url: String,
    pub bundler_engine_url: String,
}

/// The collaborator instances a worker drives. Constructed on the worker
/// thread, so none of them need to be `Send`.
pub struct Collaborators {
    pub compiler: Rc<dyn ComponentCompiler>,
    pub engine: Rc<dyn BundlerEngine>,
    pub fetcher: Rc<dyn TextFetcher>,
}

/// Builds the collaborators for a worker once its `init` message arrives.
pub trait CollaboratorFactory: Send + Sync + 'static {
    fn create(&self, init: &InitOptions) -> Result<Collaborators, Error>;
}

/// Worker-level configuration, owned by the [`crate::WorkerPool`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Capability flag for the secondary (ssr) generation pass.
    pub ssr_enabled: bool,
    /// Dev-mode flag forwarded to the component compiler.
    pub dev: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            ssr_enabled: false,
            dev: true,
        }
    }
}

/// Transform caches, one table per compilation target.
#[derive(Default)]
pub(crate) struct TargetCaches {
    pub dom: TransformCache,
    pub ssr: TransformCache,
}

/// State shared by all requests running on one worker.
pub(crate) struct WorkerContext {
    pub compiler: Rc<dyn ComponentCompiler>,
    pub engine: Rc<dyn BundlerEngine>,
    pub fetch_cache: Rc<RemoteFetchCache>,
    pub caches: RefCell<TargetCaches>,
    pub config: WorkerConfig,
    pub runtime_url: String,
}

/// Cloneable handle to a spawned worker: the request channel, the response
/// broadcast shared by every facade targeting this worker, and the
/// termination token.
#[derive(Clone)]
pub(crate) struct WorkerHandle {
    pub msg_tx: mpsc::Sender<WorkerMessage>,
    pub resp_tx: broadcast::Sender<BundleResult>,
    pub shutdown: CancellationToken,
    _thread: Arc<JoinHandle<()>>,
}

pub(crate) fn spawn_worker(
    factory: Arc<dyn CollaboratorFactory>,
    config: WorkerConfig,
) -> WorkerHandle {
    let (msg_tx, msg_rx) = mpsc::channel::<WorkerMessage>(32);
    let (resp_tx, _) = broadcast::channel::<BundleResult>(32);
    let shutdown = CancellationToken::new();

    let thread = thread::spawn({
        let resp_tx = resp_tx.clone();
        let shutdown = shutdown.clone();
        move || {
            let local = tokio::task::LocalSet::new();
            local.block_on(
                &*TOKIO_RUNTIME,
                worker_loop(msg_rx, resp_tx, shutdown, factory, config),
            );
        }
    });

    WorkerHandle {
        msg_tx,
        resp_tx,
        shutdown,
        _thread: Arc::new(thread),
    }
}

async fn worker_loop(
    mut messages: mpsc::Receiver<WorkerMessage>,
    resp_tx: broadcast::Sender<BundleResult>,
    shutdown: CancellationToken,
    factory: Arc<dyn CollaboratorFactory>,
    config: WorkerConfig,
) {
    let context: Rc<RefCell<Option<Rc<WorkerContext>>>> = Rc::new(RefCell::new(None));
    let (ready_tx, ready_rx) = watch::channel(false);

    loop {
        let message = tokio::select! {
            biased;
            // unconditional termination: in-flight requests are dropped with
            // the LocalSet, not drained
            _ = shutdown.cancelled() => break,
            message = messages.next() => match message {
                Some(message) => message,
                None => break,
            },
        };

        match message {
            WorkerMessage::Init {
                framework_runtime_url,
                bundler_engine_url,
            } => {
                if *ready_rx.borrow() {
                    log::warn!("ignoring duplicate init message");
                    continue;
                }
                let init = InitOptions {
                    framework_runtime_url: framework_runtime_url.clone(),
                    bundler_engine_url,
                };
                match factory.create(&init) {
                    Ok(collaborators) => {
                        *context.borrow_mut() = Some(Rc::new(WorkerContext {
                            compiler: collaborators.compiler,
                            engine: collaborators.engine,
                            fetch_cache: Rc::new(RemoteFetchCache::new(collaborators.fetcher)),
                            caches: RefCell::new(TargetCaches::default()),
                            config: config.clone(),
                            runtime_url: framework_runtime_url,
                        }));
                        let _ = ready_tx.send(true);
                    }
                    // surfaces indirectly as resolution failures on later
                    // requests, which stay parked on the barrier
                    Err(err) => log::error!("worker init failed: {:#}", err),
                }
            }
            WorkerMessage::Bundle { id, components } => {
                if components.is_empty() {
                    continue;
                }
                let context = Rc::clone(&context);
                let mut ready = ready_rx.clone();
                let resp_tx = resp_tx.clone();
                tokio::task::spawn_local(async move {
                    if ready.wait_for(|ready| *ready).await.is_err() {
                        return;
                    }
                    let ctx = match context.borrow().clone() {
                        Some(ctx) => ctx,
                        None => return,
                    };
                    let result = emit::assemble(&ctx, id, components).await;
                    // no subscribers means every facade is gone; drop the result
                    let _ = resp_tx.send(result);
                });
            }
        }
    }
}
