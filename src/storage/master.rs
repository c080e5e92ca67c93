use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;

use super::protocol::{BlockServerId, MasterMessage, MasterReply};
use crate::rpc::endpoint::EndpointRef;
use crate::rpc::server::EndpointHandlerFn;

/// Authoritative storage directory. Lives only on the coordinator.
pub struct MasterState {
    /// executor id -> block server identity.
    servers: DashMap<String, BlockServerId>,
    /// block id -> executor ids holding a copy.
    blocks: DashMap<String, Vec<String>>,
}

impl MasterState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            servers: DashMap::new(),
            blocks: DashMap::new(),
        })
    }

    fn handle(&self, msg: MasterMessage) -> Result<MasterReply> {
        match msg {
            MasterMessage::RegisterBlockManager { server } => {
                tracing::info!("Registered block manager {}", server);
                self.servers.insert(server.executor_id.clone(), server);
                Ok(MasterReply::Ack)
            }
            MasterMessage::ReportBlock { block_id, server } => {
                let mut holders = self.blocks.entry(block_id).or_insert_with(Vec::new);
                if !holders.contains(&server.executor_id) {
                    holders.push(server.executor_id.clone());
                }
                self.servers.entry(server.executor_id.clone()).or_insert(server);
                Ok(MasterReply::Ack)
            }
            MasterMessage::DropBlock {
                block_id,
                executor_id,
            } => {
                if let Some(mut holders) = self.blocks.get_mut(&block_id) {
                    holders.retain(|holder| holder != &executor_id);
                }
                Ok(MasterReply::Ack)
            }
            MasterMessage::GetLocations { block_id } => {
                let servers = match self.blocks.get(&block_id) {
                    Some(holders) => holders
                        .iter()
                        .filter_map(|executor_id| {
                            self.servers.get(executor_id).map(|entry| entry.value().clone())
                        })
                        .collect(),
                    None => Vec::new(),
                };
                Ok(MasterReply::Locations { servers })
            }
            MasterMessage::GetBlockManagers => {
                let mut servers: Vec<BlockServerId> = self
                    .servers
                    .iter()
                    .map(|entry| entry.value().clone())
                    .collect();
                servers.sort_by(|a, b| a.executor_id.cmp(&b.executor_id));
                Ok(MasterReply::BlockManagers { servers })
            }
        }
    }

    /// Builds the endpoint handler serving this state.
    pub fn handler(state: Arc<Self>) -> EndpointHandlerFn {
        Arc::new(move |payload| {
            let state = state.clone();
            Box::pin(async move {
                let msg: MasterMessage = serde_json::from_value(payload)?;
                let reply = state.handle(msg)?;
                Ok(serde_json::to_value(reply)?)
            }) as _
        })
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub fn clear(&self) {
        self.servers.clear();
        self.blocks.clear();
    }
}

/// Client façade over the storage-master endpoint. Identical API on both
/// roles; only the coordinator instance also owns the authority state.
pub struct StorageMasterClient {
    authority: Option<Arc<MasterState>>,
    endpoint: EndpointRef,
}

impl StorageMasterClient {
    pub fn coordinator(state: Arc<MasterState>, endpoint: EndpointRef) -> Arc<Self> {
        Arc::new(Self {
            authority: Some(state),
            endpoint,
        })
    }

    pub fn worker(endpoint: EndpointRef) -> Arc<Self> {
        Arc::new(Self {
            authority: None,
            endpoint,
        })
    }

    pub fn is_authoritative(&self) -> bool {
        self.authority.is_some()
    }

    pub async fn register_block_manager(&self, server: BlockServerId) -> Result<()> {
        self.ack(MasterMessage::RegisterBlockManager { server }).await
    }

    pub async fn report_block(&self, block_id: &str, server: BlockServerId) -> Result<()> {
        self.ack(MasterMessage::ReportBlock {
            block_id: block_id.to_string(),
            server,
        })
        .await
    }

    pub async fn drop_block(&self, block_id: &str, executor_id: &str) -> Result<()> {
        self.ack(MasterMessage::DropBlock {
            block_id: block_id.to_string(),
            executor_id: executor_id.to_string(),
        })
        .await
    }

    pub async fn get_locations(&self, block_id: &str) -> Result<Vec<BlockServerId>> {
        let reply: MasterReply = self
            .endpoint
            .ask_as(&MasterMessage::GetLocations {
                block_id: block_id.to_string(),
            })
            .await?;
        match reply {
            MasterReply::Locations { servers } => Ok(servers),
            _ => Err(anyhow::anyhow!("unexpected storage master reply")),
        }
    }

    pub async fn block_managers(&self) -> Result<Vec<BlockServerId>> {
        let reply: MasterReply = self.endpoint.ask_as(&MasterMessage::GetBlockManagers).await?;
        match reply {
            MasterReply::BlockManagers { servers } => Ok(servers),
            _ => Err(anyhow::anyhow!("unexpected storage master reply")),
        }
    }

    async fn ack(&self, msg: MasterMessage) -> Result<()> {
        let reply: MasterReply = self.endpoint.ask_as(&msg).await?;
        match reply {
            MasterReply::Ack => Ok(()),
            _ => Err(anyhow::anyhow!("unexpected storage master reply")),
        }
    }

    /// Drops authoritative state on the coordinator; workers only log.
    pub fn stop(&self) {
        if let Some(state) = &self.authority {
            state.clear();
        }
        tracing::debug!("Storage master client stopped");
    }
}
