//! Well-known configuration keys and their defaults.

/// Hostname the coordinator's messaging runtime binds and advertises.
/// Required on the coordinator.
pub const COORDINATOR_HOST: &str = "engine.coordinator.host";
/// Port for the coordinator's messaging runtime (0 = any free port).
/// Required on the coordinator.
pub const COORDINATOR_PORT: &str = "engine.coordinator.port";

/// Port actually bound by the local messaging runtime. Written back after
/// startup; never set by the operator.
pub const RPC_BOUND_PORT: &str = "engine.rpc.bound.port";
/// How long a worker waits for a coordinator endpoint to answer its
/// presence check before giving up, in milliseconds.
pub const RPC_RESOLVE_TIMEOUT_MS: &str = "engine.rpc.resolve.timeout.ms";

/// Identifier of the data serializer.
pub const SERIALIZER: &str = "engine.serializer";
/// Identifier of the serializer used for task closures. Resolved
/// independently of the data serializer.
pub const CLOSURE_SERIALIZER: &str = "engine.closure.serializer";
/// Pretty-print flag for the JSON serializer.
pub const SERIALIZER_JSON_PRETTY: &str = "engine.serializer.json.pretty";

/// Identifier of the shuffle manager. Accepts the short aliases `hash` and
/// `sort` as well as full identifiers.
pub const SHUFFLE_MANAGER: &str = "engine.shuffle.manager";
/// Byte budget for shuffle memory accounting.
pub const SHUFFLE_MEMORY_BYTES: &str = "engine.shuffle.memory.bytes";

/// Wire implementation for block transfer: `http` or `tcp`.
pub const BLOCK_TRANSPORT: &str = "engine.storage.transport";

/// Port for the coordinator's auxiliary file server (0 = any free port).
pub const FILE_SERVER_PORT: &str = "engine.fileserver.port";
/// Advertised address of the file server. Written back after startup.
pub const FILE_SERVER_ADDRESS: &str = "engine.fileserver.address";

/// Shared secret for messaging-runtime authentication. Unset = open.
pub const AUTH_SECRET: &str = "engine.auth.secret";

/// Upper bound on idle pooled worker processes per (executable, env) key.
pub const WORKER_IDLE_LIMIT: &str = "engine.workers.idle.limit";

/// Entry bound of the metadata cache.
pub const METADATA_CACHE_CAPACITY: &str = "engine.metadata.cache.capacity";

/// Metrics report interval in milliseconds.
pub const METRICS_INTERVAL_MS: &str = "engine.metrics.interval.ms";

/// Application identifier, when already known at startup (workers receive
/// it from their launcher; the coordinator supplies it later).
pub const APP_ID: &str = "engine.app.id";

/// Deprecated: per-node cache implementation override. The setting is
/// ignored; a warning is logged when present.
pub const DEPRECATED_CACHE_CLASS: &str = "engine.cache.class";

pub const DEFAULT_SERIALIZER: &str = "json";
pub const DEFAULT_CLOSURE_SERIALIZER: &str = "json";
pub const DEFAULT_SHUFFLE_MANAGER: &str = "sort";
pub const DEFAULT_BLOCK_TRANSPORT: &str = "http";
pub const DEFAULT_RPC_RESOLVE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SHUFFLE_MEMORY_BYTES: u64 = 512 * 1024 * 1024;
pub const DEFAULT_WORKER_IDLE_LIMIT: usize = 4;
pub const DEFAULT_METADATA_CACHE_CAPACITY: usize = 10_000;
pub const DEFAULT_METRICS_INTERVAL_MS: u64 = 5_000;
