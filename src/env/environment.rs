use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use super::events::{EngineEvent, EventBus};
use super::files::FileServer;
use super::metadata_cache::MetadataCache;
use crate::commit::arbitrator::CommitArbitrator;
use crate::config::settings::EngineConfig;
use crate::metrics::system::MetricsSystem;
use crate::rpc::endpoint::RpcClient;
use crate::rpc::security::SecurityManager;
use crate::rpc::server::MessagingServer;
use crate::serializer::Serializer;
use crate::shuffle::manager::ShuffleManager;
use crate::shuffle::memory::ShuffleMemoryTracker;
use crate::shuffle::tracker::ShuffleLocationTracker;
use crate::storage::block::BlockManager;
use crate::storage::broadcast::BroadcastManager;
use crate::storage::cache::CacheManager;
use crate::storage::master::StorageMasterClient;
use crate::workers::pool::WorkerProcessPool;

/// Executor id the coordinator runs under.
pub const COORDINATOR_EXECUTOR_ID: &str = "coordinator";

/// Which role this process plays, and under which executor identity.
#[derive(Debug, Clone)]
pub struct RoleIdentity {
    pub executor_id: String,
    pub is_coordinator: bool,
    pub is_local: bool,
}

impl RoleIdentity {
    pub fn coordinator(is_local: bool) -> Self {
        Self {
            executor_id: COORDINATOR_EXECUTOR_ID.to_string(),
            is_coordinator: true,
            is_local,
        }
    }

    pub fn worker(executor_id: &str, is_local: bool) -> Self {
        Self {
            executor_id: executor_id.to_string(),
            is_coordinator: false,
            is_local,
        }
    }
}

/// Everything node-local the execution layer depends on, wired once per
/// process by the composition root. Read-only after construction except
/// for the worker pool, the metadata cache, and the stopped flag.
pub struct RuntimeEnv {
    pub role: RoleIdentity,
    pub config: EngineConfig,
    pub security: Arc<SecurityManager>,
    pub messaging: Arc<MessagingServer>,
    pub rpc_client: Arc<RpcClient>,
    pub serializer: Arc<dyn Serializer>,
    pub closure_serializer: Arc<dyn Serializer>,
    pub shuffle_tracker: Arc<ShuffleLocationTracker>,
    pub shuffle_manager: Arc<dyn ShuffleManager>,
    pub shuffle_memory: Arc<ShuffleMemoryTracker>,
    pub storage_master: Arc<StorageMasterClient>,
    pub block_manager: Arc<BlockManager>,
    pub broadcast: Arc<BroadcastManager>,
    pub cache_manager: Arc<CacheManager>,
    /// Coordinator only.
    pub file_server: Option<Arc<FileServer>>,
    pub metrics: Arc<MetricsSystem>,
    /// Where user-supplied files land: a fresh temp directory on the
    /// coordinator, the working directory on workers.
    pub user_files_dir: PathBuf,
    pub commit_arbitrator: Arc<CommitArbitrator>,
    pub worker_pool: WorkerProcessPool,
    pub metadata_cache: MetadataCache,
    /// Coordinator only; lifecycle events are posted here.
    pub event_bus: Option<EventBus>,

    pub(super) stopped: AtomicBool,
    pub(super) stop_trace: Mutex<Vec<&'static str>>,
}

impl std::fmt::Debug for RuntimeEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeEnv")
            .field("role", &self.role)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl RuntimeEnv {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Component names in the order `stop()` shut them down. Empty until
    /// teardown runs.
    pub fn stop_trace(&self) -> Vec<&'static str> {
        self.stop_trace.lock().unwrap().clone()
    }

    /// Tears down every service in fixed order, messaging runtime last.
    ///
    /// The stopped flag flips before any service stops; a second call is a
    /// logged no-op. A failing step aborts the remaining teardown.
    pub async fn stop(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            tracing::warn!("Runtime environment already stopped, ignoring");
            return Ok(());
        }
        tracing::info!("Stopping runtime environment for {}", self.role.executor_id);

        self.trace("worker_pool");
        self.worker_pool.stop();

        if let Some(file_server) = &self.file_server {
            self.trace("file_server");
            file_server.shutdown();
        }

        self.trace("shuffle_tracker");
        self.shuffle_tracker.stop();

        self.trace("shuffle_manager");
        self.shuffle_manager.stop();

        self.trace("broadcast");
        self.broadcast.stop();

        self.trace("block_manager");
        self.block_manager.stop();

        self.trace("storage_master");
        self.storage_master.stop();

        self.trace("metrics");
        self.metrics.stop();

        self.trace("commit_arbitrator");
        self.commit_arbitrator.stop();

        self.trace("messaging");
        self.messaging.shutdown();

        if let Some(bus) = &self.event_bus {
            bus.post(EngineEvent::EnvironmentStopped {
                executor_id: self.role.executor_id.clone(),
            });
        }
        tracing::info!("Runtime environment stopped");
        Ok(())
    }

    fn trace(&self, component: &'static str) {
        self.stop_trace.lock().unwrap().push(component);
        tracing::debug!("Stopping {}", component);
    }
}

static GLOBAL_ENV: RwLock<Option<Arc<RuntimeEnv>>> = RwLock::new(None);

/// Installs the process-wide environment, replacing any previous one.
pub fn set_env(env: Arc<RuntimeEnv>) {
    *GLOBAL_ENV.write().unwrap() = Some(env);
}

/// The process-wide environment, if one was installed.
pub fn get_env() -> Option<Arc<RuntimeEnv>> {
    GLOBAL_ENV.read().unwrap().clone()
}

/// Empties the process-wide slot.
pub fn clear_env() {
    *GLOBAL_ENV.write().unwrap() = None;
}
