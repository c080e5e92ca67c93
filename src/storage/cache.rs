use anyhow::Result;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;

use super::block::BlockManager;

/// Keyed get-or-compute layered over the block store.
///
/// Concurrent computations of the same block are serialized through a
/// per-key gate; distinct keys never wait on each other.
pub struct CacheManager {
    block_manager: Arc<BlockManager>,
    in_flight: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl CacheManager {
    pub fn new(block_manager: Arc<BlockManager>) -> Arc<Self> {
        Arc::new(Self {
            block_manager,
            in_flight: DashMap::new(),
        })
    }

    /// Returns the cached block, or computes, stores, and returns it.
    pub async fn get_or_compute<F, Fut>(&self, block_id: &str, compute: F) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        if let Some(bytes) = self.block_manager.get(block_id).await? {
            return Ok(bytes);
        }

        // Clone the gate out before locking so the map shard is not held
        // across the await.
        let gate = self
            .in_flight
            .entry(block_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .value()
            .clone();
        let _guard = gate.lock().await;

        // A concurrent computation may have won the gate first.
        if let Some(bytes) = self.block_manager.get(block_id).await? {
            return Ok(bytes);
        }

        tracing::debug!("Computing block {}", block_id);
        let bytes = compute().await?;
        self.block_manager.put(block_id, bytes.clone()).await?;

        self.in_flight.remove(block_id);
        Ok(bytes)
    }

    pub fn stop(&self) {
        self.in_flight.clear();
        tracing::debug!("Cache manager stopped");
    }
}
