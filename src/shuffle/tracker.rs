use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;

use super::protocol::{TrackerMessage, TrackerReply};
use crate::rpc::endpoint::EndpointRef;
use crate::rpc::server::EndpointHandlerFn;
use crate::storage::protocol::BlockServerId;

/// Authoritative tracker state. Lives only on the coordinator.
pub struct TrackerState {
    /// Structure: shuffle id -> map partition -> block server holding the
    /// output.
    shuffles: DashMap<u32, DashMap<u32, BlockServerId>>,
}

impl TrackerState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            shuffles: DashMap::new(),
        })
    }

    fn handle(&self, msg: TrackerMessage) -> Result<TrackerReply> {
        match msg {
            TrackerMessage::RegisterShuffle {
                shuffle_id,
                partition_count,
            } => {
                self.shuffles.entry(shuffle_id).or_insert_with(DashMap::new);
                tracing::info!(
                    "Registered shuffle {} ({} partitions)",
                    shuffle_id,
                    partition_count
                );
                Ok(TrackerReply::Ack)
            }
            TrackerMessage::RegisterOutput {
                shuffle_id,
                partition,
                server,
            } => {
                let outputs = self.shuffles.entry(shuffle_id).or_insert_with(DashMap::new);
                outputs.insert(partition, server);
                Ok(TrackerReply::Ack)
            }
            TrackerMessage::GetOutputs { shuffle_id } => {
                let mut outputs: Vec<(u32, BlockServerId)> = match self.shuffles.get(&shuffle_id) {
                    Some(partitions) => partitions
                        .iter()
                        .map(|entry| (*entry.key(), entry.value().clone()))
                        .collect(),
                    None => Vec::new(),
                };
                outputs.sort_by_key(|(partition, _)| *partition);
                Ok(TrackerReply::Outputs { outputs })
            }
            TrackerMessage::UnregisterShuffle { shuffle_id } => {
                self.shuffles.remove(&shuffle_id);
                tracing::debug!("Unregistered shuffle {}", shuffle_id);
                Ok(TrackerReply::Ack)
            }
        }
    }

    /// Builds the endpoint handler serving this state.
    pub fn handler(state: Arc<Self>) -> EndpointHandlerFn {
        Arc::new(move |payload| {
            let state = state.clone();
            Box::pin(async move {
                let msg: TrackerMessage = serde_json::from_value(payload)?;
                let reply = state.handle(msg)?;
                Ok(serde_json::to_value(reply)?)
            }) as _
        })
    }

    pub fn shuffle_count(&self) -> usize {
        self.shuffles.len()
    }

    pub fn clear(&self) {
        self.shuffles.clear();
    }
}

/// Shuffle-location tracking service as seen by the rest of the node.
///
/// The coordinator instance owns the authoritative state; worker instances
/// hold only the resolved endpoint and read through it.
pub struct ShuffleLocationTracker {
    authority: Option<Arc<TrackerState>>,
    endpoint: EndpointRef,
}

impl ShuffleLocationTracker {
    pub fn coordinator(state: Arc<TrackerState>, endpoint: EndpointRef) -> Self {
        Self {
            authority: Some(state),
            endpoint,
        }
    }

    pub fn worker(endpoint: EndpointRef) -> Self {
        Self {
            authority: None,
            endpoint,
        }
    }

    pub fn is_authoritative(&self) -> bool {
        self.authority.is_some()
    }

    pub async fn register_shuffle(&self, shuffle_id: u32, partition_count: u32) -> Result<()> {
        self.ack(TrackerMessage::RegisterShuffle {
            shuffle_id,
            partition_count,
        })
        .await
    }

    pub async fn register_output(
        &self,
        shuffle_id: u32,
        partition: u32,
        server: BlockServerId,
    ) -> Result<()> {
        self.ack(TrackerMessage::RegisterOutput {
            shuffle_id,
            partition,
            server,
        })
        .await
    }

    pub async fn get_outputs(&self, shuffle_id: u32) -> Result<Vec<(u32, BlockServerId)>> {
        let reply: TrackerReply = self
            .endpoint
            .ask_as(&TrackerMessage::GetOutputs { shuffle_id })
            .await?;
        match reply {
            TrackerReply::Outputs { outputs } => Ok(outputs),
            TrackerReply::Ack => Err(anyhow::anyhow!("unexpected tracker reply")),
        }
    }

    pub async fn unregister_shuffle(&self, shuffle_id: u32) -> Result<()> {
        self.ack(TrackerMessage::UnregisterShuffle { shuffle_id }).await
    }

    async fn ack(&self, msg: TrackerMessage) -> Result<()> {
        let reply: TrackerReply = self.endpoint.ask_as(&msg).await?;
        match reply {
            TrackerReply::Ack => Ok(()),
            TrackerReply::Outputs { .. } => Err(anyhow::anyhow!("unexpected tracker reply")),
        }
    }

    /// Drops authoritative state. Worker instances have nothing to release.
    pub fn stop(&self) {
        if let Some(state) = &self.authority {
            state.clear();
        }
        tracing::debug!("Shuffle tracker stopped");
    }
}
