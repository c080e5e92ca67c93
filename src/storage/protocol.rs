//! Storage Wire Protocol
//!
//! DTOs for the storage master endpoint and for block transfer between
//! nodes. Control messages ride the messaging runtime as JSON; block bytes
//! ride the configured transport.

use serde::{Deserialize, Serialize};

/// Endpoint name of the storage-directory master.
pub const STORAGE_MASTER_ENDPOINT: &str = "storage-master";

/// Identity of one node's block server: who owns the blocks and where they
/// can be fetched from over the configured transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BlockServerId {
    pub executor_id: String,
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for BlockServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.executor_id, self.host, self.port)
    }
}

/// Messages understood by the storage master.
#[derive(Debug, Serialize, Deserialize)]
pub enum MasterMessage {
    /// A block manager announces itself after initialization.
    RegisterBlockManager { server: BlockServerId },
    /// A node reports that it holds a block.
    ReportBlock { block_id: String, server: BlockServerId },
    /// A node dropped a block.
    DropBlock { block_id: String, executor_id: String },
    /// Where can this block be fetched from?
    GetLocations { block_id: String },
    /// Which block managers are registered?
    GetBlockManagers,
}

/// Replies from the storage master.
#[derive(Debug, Serialize, Deserialize)]
pub enum MasterReply {
    Ack,
    Locations { servers: Vec<BlockServerId> },
    BlockManagers { servers: Vec<BlockServerId> },
}

/// Endpoint name a node serves its blocks under on the HTTP transport.
pub fn block_endpoint(executor_id: &str) -> String {
    format!("blocks-{}", executor_id)
}

/// Block fetch request on the HTTP transport.
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchBlockRequest {
    pub block_id: String,
}

/// Block fetch reply on the HTTP transport. `bytes` is absent when the
/// block is unknown.
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchBlockResponse {
    pub bytes: Option<Vec<u8>>,
}

/// Frame sent to the TCP transport listener: the requested block id.
#[derive(Debug, Serialize, Deserialize)]
pub struct TcpFetchRequest {
    pub block_id: String,
}

/// Frame answered by the TCP transport listener.
#[derive(Debug, Serialize, Deserialize)]
pub struct TcpFetchResponse {
    pub bytes: Option<Vec<u8>>,
}
