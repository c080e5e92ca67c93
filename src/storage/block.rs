use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

use super::master::StorageMasterClient;
use super::protocol::{BlockServerId, FetchBlockRequest, FetchBlockResponse, block_endpoint};
use super::transport::{self, BlockTransport};
use crate::rpc::server::MessagingServer;
use crate::serializer::Serializer;
use crate::shuffle::manager::ShuffleManager;

/// Node-local block store with remote read-through.
///
/// Two-phase: construction wires the serving side but the manager accepts
/// no I/O until [`BlockManager::initialize`] has registered it with the
/// storage master.
pub struct BlockManager {
    executor_id: String,
    blocks: Arc<DashMap<String, Vec<u8>>>,
    transport: BlockTransport,
    master: Arc<StorageMasterClient>,
    serializer: Arc<dyn Serializer>,
    shuffle_manager: Arc<dyn ShuffleManager>,
    server_id: BlockServerId,
    serve_task: Option<JoinHandle<()>>,
    initialized: AtomicBool,
}

impl BlockManager {
    /// Wires the serving side of the block store.
    ///
    /// On the HTTP transport blocks are served through a per-node endpoint
    /// on the messaging runtime; on the TCP transport a dedicated listener
    /// is bound. Either way the resulting (host, port) become this node's
    /// block server identity.
    pub async fn new(
        executor_id: &str,
        messaging: &MessagingServer,
        transport: BlockTransport,
        master: Arc<StorageMasterClient>,
        serializer: Arc<dyn Serializer>,
        shuffle_manager: Arc<dyn ShuffleManager>,
    ) -> Result<Arc<Self>> {
        let blocks: Arc<DashMap<String, Vec<u8>>> = Arc::new(DashMap::new());
        let host = messaging.address().host;

        let (port, serve_task) = match &transport {
            BlockTransport::Http(_) => {
                let served = blocks.clone();
                messaging.register_endpoint(&block_endpoint(executor_id), move |payload| {
                    let blocks = served.clone();
                    async move {
                        let request: FetchBlockRequest = serde_json::from_value(payload)?;
                        let bytes = blocks
                            .get(&request.block_id)
                            .map(|entry| entry.value().clone());
                        Ok(serde_json::to_value(FetchBlockResponse { bytes })?)
                    }
                });
                (messaging.bound_port(), None)
            }
            BlockTransport::Tcp(_) => {
                let (port, handle) = transport::serve_tcp(&host, blocks.clone()).await?;
                (port, Some(handle))
            }
        };

        let server_id = BlockServerId {
            executor_id: executor_id.to_string(),
            host,
            port,
        };
        tracing::info!(
            "Block manager {} serving over {} transport",
            server_id,
            transport.kind()
        );

        Ok(Arc::new(Self {
            executor_id: executor_id.to_string(),
            blocks,
            transport,
            master,
            serializer,
            shuffle_manager,
            server_id,
            serve_task,
            initialized: AtomicBool::new(false),
        }))
    }

    /// Registers with the storage master and opens the store for I/O.
    pub async fn initialize(&self, app_id: &str) -> Result<()> {
        self.master.register_block_manager(self.server_id.clone()).await?;
        self.initialized.store(true, Ordering::SeqCst);
        tracing::info!("Block manager {} initialized for {}", self.executor_id, app_id);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(anyhow::anyhow!(
                "block manager {} used before initialize",
                self.executor_id
            ));
        }
        Ok(())
    }

    pub fn server_id(&self) -> &BlockServerId {
        &self.server_id
    }

    /// Stores a block locally and reports it to the master.
    pub async fn put(&self, block_id: &str, bytes: Vec<u8>) -> Result<()> {
        self.ensure_initialized()?;
        self.blocks.insert(block_id.to_string(), bytes);
        self.master.report_block(block_id, self.server_id.clone()).await?;
        Ok(())
    }

    /// Serializes a payload and stores it as a block.
    pub async fn put_value(&self, block_id: &str, value: &serde_json::Value) -> Result<()> {
        let bytes = self.serializer.serialize(value)?;
        self.put(block_id, bytes).await
    }

    pub fn get_local(&self, block_id: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_initialized()?;
        Ok(self.blocks.get(block_id).map(|entry| entry.value().clone()))
    }

    /// Local lookup with remote read-through: asks the master for holders
    /// and fetches over the transport, keeping a local copy on success.
    pub async fn get(&self, block_id: &str) -> Result<Option<Vec<u8>>> {
        if let Some(bytes) = self.get_local(block_id)? {
            return Ok(Some(bytes));
        }

        let locations = self.master.get_locations(block_id).await?;
        for server in locations {
            if server.executor_id == self.executor_id {
                continue;
            }
            match self.transport.fetch(&server, block_id).await {
                Ok(Some(bytes)) => {
                    tracing::debug!("Fetched block {} from {}", block_id, server);
                    self.blocks.insert(block_id.to_string(), bytes.clone());
                    return Ok(Some(bytes));
                }
                Ok(None) => {
                    tracing::debug!("Block {} not found on {}", block_id, server);
                }
                Err(e) => {
                    tracing::warn!("Fetch of {} from {} failed: {}", block_id, server, e);
                }
            }
        }

        Ok(None)
    }

    /// Fetches a block and deserializes it back into a payload.
    pub async fn get_value(&self, block_id: &str) -> Result<Option<serde_json::Value>> {
        match self.get(block_id).await? {
            Some(bytes) => Ok(Some(self.serializer.deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn drop_block(&self, block_id: &str) -> Result<()> {
        self.ensure_initialized()?;
        self.blocks.remove(block_id);
        self.master.drop_block(block_id, &self.executor_id).await?;
        Ok(())
    }

    /// Block id for a shuffle output under the configured strategy.
    pub fn shuffle_block_id(&self, shuffle_id: u32, map_id: u32, reduce_id: u32) -> String {
        self.shuffle_manager.shuffle_block_id(shuffle_id, map_id, reduce_id)
    }

    pub fn local_block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Stops serving and drops local blocks.
    pub fn stop(&self) {
        if let Some(handle) = &self.serve_task {
            handle.abort();
        }
        self.blocks.clear();
        tracing::debug!("Block manager {} stopped", self.executor_id);
    }
}
