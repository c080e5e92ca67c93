use dashmap::DashMap;

use crate::config::keys;
use crate::plugin::resolver::ComponentRegistry;

pub const HASH_SHUFFLE_MANAGER: &str = "shuffle::HashShuffleManager";
pub const SORT_SHUFFLE_MANAGER: &str = "shuffle::SortShuffleManager";

/// Node-local shuffle strategy. Decides how map outputs are laid out as
/// blocks; the execution layer writes and fetches through these names.
pub trait ShuffleManager: Send + Sync {
    /// Full identifier of this implementation.
    fn name(&self) -> &'static str;

    /// Local bookkeeping for a new shuffle.
    fn register_shuffle(&self, shuffle_id: u32, partition_count: u32);

    /// Block id holding the bytes map task `map_id` produced for reducer
    /// `reduce_id`.
    fn shuffle_block_id(&self, shuffle_id: u32, map_id: u32, reduce_id: u32) -> String;

    fn registered_shuffles(&self) -> usize;

    fn stop(&self);
}

/// One block per (map, reduce) pair.
pub struct HashShuffleManager {
    shuffles: DashMap<u32, u32>,
}

impl HashShuffleManager {
    pub fn new() -> Self {
        Self {
            shuffles: DashMap::new(),
        }
    }
}

impl ShuffleManager for HashShuffleManager {
    fn name(&self) -> &'static str {
        HASH_SHUFFLE_MANAGER
    }

    fn register_shuffle(&self, shuffle_id: u32, partition_count: u32) {
        self.shuffles.insert(shuffle_id, partition_count);
    }

    fn shuffle_block_id(&self, shuffle_id: u32, map_id: u32, reduce_id: u32) -> String {
        format!("shuffle_{}_{}_{}", shuffle_id, map_id, reduce_id)
    }

    fn registered_shuffles(&self) -> usize {
        self.shuffles.len()
    }

    fn stop(&self) {
        self.shuffles.clear();
    }
}

/// One consolidated, sorted block per map task; reducers index into it.
pub struct SortShuffleManager {
    shuffles: DashMap<u32, u32>,
}

impl SortShuffleManager {
    pub fn new() -> Self {
        Self {
            shuffles: DashMap::new(),
        }
    }
}

impl ShuffleManager for SortShuffleManager {
    fn name(&self) -> &'static str {
        SORT_SHUFFLE_MANAGER
    }

    fn register_shuffle(&self, shuffle_id: u32, partition_count: u32) {
        self.shuffles.insert(shuffle_id, partition_count);
    }

    fn shuffle_block_id(&self, shuffle_id: u32, map_id: u32, _reduce_id: u32) -> String {
        // All reducers read the same sorted map output.
        format!("shuffle_{}_{}_sorted", shuffle_id, map_id)
    }

    fn registered_shuffles(&self) -> usize {
        self.shuffles.len()
    }

    fn stop(&self) {
        self.shuffles.clear();
    }
}

/// Builds the registry of selectable shuffle managers with the `hash` and
/// `sort` aliases next to the full identifiers.
pub fn registry() -> ComponentRegistry<dyn ShuffleManager> {
    let mut registry: ComponentRegistry<dyn ShuffleManager> = ComponentRegistry::new();

    registry.register_no_args(HASH_SHUFFLE_MANAGER, || Box::new(HashShuffleManager::new()));
    registry.register_no_args(SORT_SHUFFLE_MANAGER, || Box::new(SortShuffleManager::new()));

    registry.register_alias("hash", HASH_SHUFFLE_MANAGER);
    registry.register_alias("sort", SORT_SHUFFLE_MANAGER);

    registry
}

/// Resolves the configured shuffle-manager identifier (alias or full) to
/// its canonical form without instantiating it.
pub fn canonical_name(config: &crate::config::settings::EngineConfig) -> String {
    let identifier = config.get_or(keys::SHUFFLE_MANAGER, keys::DEFAULT_SHUFFLE_MANAGER);
    registry().canonical_identifier(&identifier)
}
