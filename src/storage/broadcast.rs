use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::block::BlockManager;

/// Handle to a published broadcast value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Broadcast {
    pub id: u64,
    pub block_id: String,
}

/// Publishes read-only values once and lets every node fetch them through
/// the block layer (local hit or remote read-through).
pub struct BroadcastManager {
    block_manager: Arc<BlockManager>,
    next_id: AtomicU64,
}

impl BroadcastManager {
    pub fn new(block_manager: Arc<BlockManager>) -> Arc<Self> {
        Arc::new(Self {
            block_manager,
            next_id: AtomicU64::new(0),
        })
    }

    /// Publishes a value under a fresh broadcast id.
    pub async fn publish(&self, value: &serde_json::Value) -> Result<Broadcast> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let block_id = format!("broadcast_{}", id);

        self.block_manager.put_value(&block_id, value).await?;
        tracing::debug!("Published broadcast {}", block_id);

        Ok(Broadcast { id, block_id })
    }

    /// Fetches a broadcast value, pulling it from a remote holder when the
    /// local store misses.
    pub async fn fetch(&self, broadcast: &Broadcast) -> Result<serde_json::Value> {
        self.block_manager
            .get_value(&broadcast.block_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("broadcast {} not found anywhere", broadcast.block_id))
    }

    pub fn stop(&self) {
        tracing::debug!("Broadcast manager stopped");
    }
}
