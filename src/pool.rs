//! Explicit worker registry, owned by the composition root and injected into
//! facades instead of being reached through process-wide singleton state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::protocol::WorkerMessage;
use crate::worker::{spawn_worker, CollaboratorFactory, WorkerConfig, WorkerHandle};

/// Owns one long-lived worker per distinct framework-runtime location.
/// Workers are spawned lazily on first use and receive their `init` message
/// exactly once, at spawn.
pub struct WorkerPool {
    factory: Arc<dyn CollaboratorFactory>,
    config: WorkerConfig,
    workers: Mutex<HashMap<String, WorkerHandle>>,
}

impl WorkerPool {
    pub fn new(factory: Arc<dyn CollaboratorFactory>) -> Self {
        Self::with_config(factory, WorkerConfig::default())
    }

    pub fn with_config(factory: Arc<dyn CollaboratorFactory>, config: WorkerConfig) -> Self {
        Self {
            factory,
            config,
            workers: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn worker_for(
        &self,
        framework_runtime_url: &str,
        bundler_engine_url: &str,
    ) -> WorkerHandle {
        let mut workers = self.workers.lock().expect("worker pool mutex poisoned");
        workers
            .entry(framework_runtime_url.to_string())
            .or_insert_with(|| {
                log::info!("spawning bundle worker for {}", framework_runtime_url);
                let handle = spawn_worker(Arc::clone(&self.factory), self.config.clone());
                let mut init_tx = handle.msg_tx.clone();
                let init = WorkerMessage::Init {
                    framework_runtime_url: framework_runtime_url.to_string(),
                    bundler_engine_url: bundler_engine_url.to_string(),
                };
                if let Err(err) = init_tx.try_send(init) {
                    log::error!(
                        "failed to deliver init message to {}: {}",
                        framework_runtime_url,
                        err
                    );
                }
                handle
            })
            .clone()
    }
}
