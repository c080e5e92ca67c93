use anyhow::Result;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::environment::{RoleIdentity, RuntimeEnv};
use super::events::{EngineEvent, EventBus};
use super::files::FileServer;
use super::metadata_cache::MetadataCache;
use crate::commit::arbitrator::{ArbitratorState, COMMIT_ARBITRATOR_ENDPOINT, CommitArbitrator};
use crate::config::keys;
use crate::config::settings::EngineConfig;
use crate::error::RuntimeError;
use crate::metrics::system::MetricsSystem;
use crate::rpc::endpoint::{RpcClient, register_or_resolve};
use crate::rpc::security::SecurityManager;
use crate::rpc::server::MessagingServer;
use crate::rpc::types::RpcAddress;
use crate::serializer::{self, Serializer};
use crate::shuffle::manager::{self, ShuffleManager};
use crate::shuffle::memory::ShuffleMemoryTracker;
use crate::shuffle::protocol::SHUFFLE_TRACKER_ENDPOINT;
use crate::shuffle::tracker::{ShuffleLocationTracker, TrackerState};
use crate::storage::block::BlockManager;
use crate::storage::broadcast::BroadcastManager;
use crate::storage::cache::CacheManager;
use crate::storage::master::{MasterState, StorageMasterClient};
use crate::storage::protocol::STORAGE_MASTER_ENDPOINT;
use crate::storage::transport::BlockTransport;
use crate::workers::pool::WorkerProcessPool;

/// Builds the coordinator's environment.
///
/// The coordinator's network identity must be configured; both keys are
/// checked before any service is constructed, so a failure here has no
/// side effects.
pub async fn create_coordinator_env(
    config: EngineConfig,
    event_bus: EventBus,
    is_local: bool,
    commit_override: Option<Arc<CommitArbitrator>>,
) -> Result<Arc<RuntimeEnv>> {
    let host = config.require(keys::COORDINATOR_HOST)?;
    let port = required_port(&config, keys::COORDINATOR_PORT)?;

    let role = RoleIdentity::coordinator(is_local);
    create(config, role, &host, port, Some(event_bus), commit_override).await
}

/// Builds a worker's environment, bound to the given local identity and
/// addressing the coordinator configured in `config`.
pub async fn create_worker_env(
    config: EngineConfig,
    executor_id: &str,
    bind_host: &str,
    requested_port: u16,
    is_local: bool,
) -> Result<Arc<RuntimeEnv>> {
    let role = RoleIdentity::worker(executor_id, is_local);
    create(config, role, bind_host, requested_port, None, None).await
}

/// The role-aware composition root. Steps run strictly in order; each
/// feeds the next, and any failure aborts the whole construction without
/// publishing a partial environment.
async fn create(
    config: EngineConfig,
    role: RoleIdentity,
    bind_host: &str,
    requested_port: u16,
    event_bus: Option<EventBus>,
    commit_override: Option<Arc<CommitArbitrator>>,
) -> Result<Arc<RuntimeEnv>> {
    // Workers must know the coordinator's address before anything is wired.
    let configured_coordinator = if role.is_coordinator {
        None
    } else {
        let host = config.require(keys::COORDINATOR_HOST)?;
        let port = required_port(&config, keys::COORDINATOR_PORT)?;
        Some(RpcAddress::new(&host, port))
    };

    tracing::info!(
        "Creating runtime environment for {} on {}:{}",
        role.executor_id,
        bind_host,
        requested_port
    );

    // 1. Security context:
    let security = Arc::new(SecurityManager::new(&config));

    // 2. Messaging runtime; publish the actually bound port for discovery:
    let messaging = MessagingServer::start(bind_host, requested_port, security.clone()).await?;
    config.set(keys::RPC_BOUND_PORT, &messaging.bound_port().to_string());

    let resolve_timeout = Duration::from_millis(config.get_u64(
        keys::RPC_RESOLVE_TIMEOUT_MS,
        keys::DEFAULT_RPC_RESOLVE_TIMEOUT_MS,
    ));
    let rpc_client = RpcClient::new(&security, resolve_timeout);
    let coordinator_addr = configured_coordinator.unwrap_or_else(|| messaging.address());

    // 3. Data and closure serializers, resolved independently:
    let serializer_registry = serializer::registry();
    let serializer: Arc<dyn Serializer> = Arc::from(serializer_registry.resolve_from_config(
        &config,
        keys::SERIALIZER,
        keys::DEFAULT_SERIALIZER,
        role.is_coordinator,
    )?);
    let closure_serializer: Arc<dyn Serializer> =
        Arc::from(serializer_registry.resolve_from_config(
            &config,
            keys::CLOSURE_SERIALIZER,
            keys::DEFAULT_CLOSURE_SERIALIZER,
            role.is_coordinator,
        )?);

    // 4. Shuffle-location tracker; authoritative state only on the
    //    coordinator, endpoint wired either way:
    let tracker_state = role.is_coordinator.then(TrackerState::new);
    let tracker_endpoint = {
        let state = tracker_state.clone();
        register_or_resolve(
            role.is_coordinator,
            &messaging,
            &rpc_client,
            &coordinator_addr,
            SHUFFLE_TRACKER_ENDPOINT,
            // Invoked only on the coordinator, where the state exists.
            move || TrackerState::handler(state.expect("tracker state on coordinator")),
        )
        .await?
    };
    let shuffle_tracker = Arc::new(match tracker_state {
        Some(state) => ShuffleLocationTracker::coordinator(state, tracker_endpoint),
        None => ShuffleLocationTracker::worker(tracker_endpoint),
    });

    // 5. Shuffle manager (pluggable, short aliases allowed) and shuffle
    //    memory accounting:
    let shuffle_manager: Arc<dyn ShuffleManager> =
        Arc::from(manager::registry().resolve_from_config(
            &config,
            keys::SHUFFLE_MANAGER,
            keys::DEFAULT_SHUFFLE_MANAGER,
            role.is_coordinator,
        )?);
    let shuffle_memory = Arc::new(ShuffleMemoryTracker::new(config.get_u64(
        keys::SHUFFLE_MEMORY_BYTES,
        keys::DEFAULT_SHUFFLE_MEMORY_BYTES,
    )));

    // 6. Block-transfer transport, selected by configuration:
    let transport = BlockTransport::from_config(&config, rpc_client.clone())?;

    // 7. Storage-directory master endpoint, wrapped in a client façade:
    let master_state = role.is_coordinator.then(MasterState::new);
    let master_endpoint = {
        let state = master_state.clone();
        register_or_resolve(
            role.is_coordinator,
            &messaging,
            &rpc_client,
            &coordinator_addr,
            STORAGE_MASTER_ENDPOINT,
            move || MasterState::handler(state.expect("master state on coordinator")),
        )
        .await?
    };
    let storage_master = match master_state {
        Some(state) => StorageMasterClient::coordinator(state, master_endpoint),
        None => StorageMasterClient::worker(master_endpoint),
    };

    // 8. Block manager; serving side wired now, no I/O until a later
    //    explicit initialize registers it with the master:
    let block_manager = BlockManager::new(
        &role.executor_id,
        &messaging,
        transport,
        storage_master.clone(),
        serializer.clone(),
        shuffle_manager.clone(),
    )
    .await?;

    // 9. Broadcast manager, then cache manager layered over the block
    //    manager:
    let broadcast = BroadcastManager::new(block_manager.clone());
    let cache_manager = CacheManager::new(block_manager.clone());

    // 10. Coordinator only: auxiliary file server; publish its address:
    let file_server = if role.is_coordinator {
        let files_root =
            std::env::temp_dir().join(format!("engine-files-{}", uuid::Uuid::new_v4()));
        let server = FileServer::start(
            bind_host,
            config.get_u16(keys::FILE_SERVER_PORT, 0),
            files_root,
            security.clone(),
        )
        .await?;
        config.set(keys::FILE_SERVER_ADDRESS, &server.address().to_string());
        Some(server)
    } else {
        None
    };

    // 11. Metrics pipeline; workers start now, the coordinator waits for
    //     an application id from its caller:
    let metrics = MetricsSystem::new(
        if role.is_coordinator { "coordinator" } else { "worker" },
        &config,
    );
    if !role.is_coordinator {
        metrics.start(&config.get_or(keys::APP_ID, "app-local"));
    }

    // 12. User-files working directory:
    let user_files_dir = if role.is_coordinator {
        let dir = std::env::temp_dir().join(format!("engine-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir)?;
        dir
    } else {
        std::env::current_dir()?
    };

    // 13. Output-commit arbitrator (an injected override is wired the
    //     same way):
    let commit_arbitrator = match commit_override {
        Some(injected) => injected,
        None => CommitArbitrator::new(role.is_coordinator),
    };
    if role.is_coordinator && !commit_arbitrator.is_authoritative() {
        return Err(anyhow::anyhow!(
            "injected commit arbitrator must be authoritative on the coordinator"
        ));
    }
    let arbitrator_endpoint = {
        let state = commit_arbitrator.state();
        register_or_resolve(
            role.is_coordinator,
            &messaging,
            &rpc_client,
            &coordinator_addr,
            COMMIT_ARBITRATOR_ENDPOINT,
            move || ArbitratorState::handler(state.expect("arbitrator state on coordinator")),
        )
        .await?
    };
    commit_arbitrator.attach_endpoint(arbitrator_endpoint);

    // 14. Assemble; services are reachable only through this aggregate:
    let worker_pool = WorkerProcessPool::new(&config);
    let metadata_cache = MetadataCache::new(config.get_usize(
        keys::METADATA_CACHE_CAPACITY,
        keys::DEFAULT_METADATA_CACHE_CAPACITY,
    ));

    if let Some(bus) = &event_bus {
        bus.post(EngineEvent::EnvironmentReady {
            executor_id: role.executor_id.clone(),
        });
    }
    tracing::info!("Runtime environment ready for {}", role.executor_id);

    Ok(Arc::new(RuntimeEnv {
        role,
        config,
        security,
        messaging,
        rpc_client,
        serializer,
        closure_serializer,
        shuffle_tracker,
        shuffle_manager,
        shuffle_memory,
        storage_master,
        block_manager,
        broadcast,
        cache_manager,
        file_server,
        metrics,
        user_files_dir,
        commit_arbitrator,
        worker_pool,
        metadata_cache,
        event_bus,
        stopped: AtomicBool::new(false),
        stop_trace: Mutex::new(Vec::new()),
    }))
}

fn required_port(config: &EngineConfig, key: &str) -> Result<u16> {
    let value = config.require(key)?;
    match value.parse::<u16>() {
        Ok(port) => Ok(port),
        Err(_) => Err(RuntimeError::Configuration(key.to_string()).into()),
    }
}
