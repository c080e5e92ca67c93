use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::factory::{PoolKey, WorkerFactory, WorkerHandle};
use crate::config::keys;
use crate::config::settings::EngineConfig;

/// Process-wide pool of external worker processes, keyed by
/// (executable, environment).
///
/// All three operations take the same map lock only for the lookup; the
/// spawn/terminate work happens against the per-key factory afterwards, so
/// concurrent callers on distinct keys overlap freely.
pub struct WorkerProcessPool {
    factories: Mutex<HashMap<PoolKey, Arc<WorkerFactory>>>,
    idle_limit: usize,
    stopped: AtomicBool,
}

impl WorkerProcessPool {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            factories: Mutex::new(HashMap::new()),
            idle_limit: config.get_usize(keys::WORKER_IDLE_LIMIT, keys::DEFAULT_WORKER_IDLE_LIMIT),
            stopped: AtomicBool::new(false),
        }
    }

    /// Produces a connection for the key, lazily creating its factory.
    pub fn acquire(
        &self,
        executable: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<WorkerHandle> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("worker pool is stopped"));
        }

        let key = PoolKey::new(executable, env);
        let factory = {
            let mut factories = self.factories.lock().unwrap();
            factories
                .entry(key.clone())
                .or_insert_with(|| Arc::new(WorkerFactory::new(key, self.idle_limit)))
                .clone()
        };

        factory.create()
    }

    /// Returns a connection to its factory's idle set. Unknown keys are a
    /// silent no-op; the handle's drop reclaims the process.
    pub fn release(&self, executable: &str, env: &BTreeMap<String, String>, handle: WorkerHandle) {
        let key = PoolKey::new(executable, env);
        let factory = self.factories.lock().unwrap().get(&key).cloned();

        match factory {
            Some(factory) => factory.release(handle),
            None => {
                tracing::debug!("Released worker for unknown pool key {}", executable);
            }
        }
    }

    /// Permanently terminates a connection. Unknown keys are a silent
    /// no-op; the handle's drop reclaims the process either way.
    pub fn destroy(&self, executable: &str, env: &BTreeMap<String, String>, handle: WorkerHandle) {
        let key = PoolKey::new(executable, env);
        let factory = self.factories.lock().unwrap().get(&key).cloned();

        match factory {
            Some(factory) => factory.destroy(handle),
            None => {
                tracing::debug!("Destroyed worker for unknown pool key {}", executable);
            }
        }
    }

    /// Stops every factory and terminates all idle workers.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let factories: Vec<Arc<WorkerFactory>> =
            self.factories.lock().unwrap().drain().map(|(_, f)| f).collect();
        for factory in &factories {
            factory.stop();
        }
        tracing::info!("Worker pool stopped ({} factories)", factories.len());
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn factory_count(&self) -> usize {
        self.factories.lock().unwrap().len()
    }
}
