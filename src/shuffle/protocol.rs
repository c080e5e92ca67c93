//! Shuffle Tracker Wire Protocol

use serde::{Deserialize, Serialize};

use crate::storage::protocol::BlockServerId;

/// Endpoint name of the shuffle-location tracker.
pub const SHUFFLE_TRACKER_ENDPOINT: &str = "shuffle-tracker";

/// Messages understood by the shuffle-location tracker.
#[derive(Debug, Serialize, Deserialize)]
pub enum TrackerMessage {
    /// Announce a shuffle before any of its outputs are registered.
    RegisterShuffle { shuffle_id: u32, partition_count: u32 },
    /// Record where the output of one map partition landed.
    RegisterOutput {
        shuffle_id: u32,
        partition: u32,
        server: BlockServerId,
    },
    /// Fetch all known output locations of a shuffle.
    GetOutputs { shuffle_id: u32 },
    /// Drop a completed shuffle's bookkeeping.
    UnregisterShuffle { shuffle_id: u32 },
}

/// Replies from the shuffle-location tracker.
#[derive(Debug, Serialize, Deserialize)]
pub enum TrackerReply {
    Ack,
    /// (partition, server) pairs, one per registered output.
    Outputs { outputs: Vec<(u32, BlockServerId)> },
}
