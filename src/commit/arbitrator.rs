use anyhow::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::rpc::endpoint::EndpointRef;
use crate::rpc::server::EndpointHandlerFn;

/// Endpoint name of the output-commit arbitrator.
pub const COMMIT_ARBITRATOR_ENDPOINT: &str = "commit-arbitrator";

/// Messages understood by the arbitrator.
#[derive(Debug, Serialize, Deserialize)]
pub enum CommitMessage {
    /// May this attempt finalize the output of (stage, partition)?
    CanCommit {
        stage: u32,
        partition: u32,
        attempt: u32,
    },
    /// The stage finished; forget its decisions.
    StageEnd { stage: u32 },
}

/// Replies from the arbitrator.
#[derive(Debug, Serialize, Deserialize)]
pub enum CommitReply {
    Decision { authorized: bool },
    Ack,
}

/// Authoritative decision state. Lives only on the coordinator.
pub struct ArbitratorState {
    /// (stage, partition) -> attempt that won the right to commit.
    decisions: DashMap<(u32, u32), u32>,
}

impl ArbitratorState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            decisions: DashMap::new(),
        })
    }

    fn handle(&self, msg: CommitMessage) -> Result<CommitReply> {
        match msg {
            CommitMessage::CanCommit {
                stage,
                partition,
                attempt,
            } => {
                // Atomic first-wins claim: the entry call decides.
                let winner = *self.decisions.entry((stage, partition)).or_insert(attempt);
                let authorized = winner == attempt;
                if authorized {
                    tracing::debug!(
                        "Attempt {} authorized to commit stage {} partition {}",
                        attempt,
                        stage,
                        partition
                    );
                } else {
                    tracing::info!(
                        "Denied commit of stage {} partition {} to attempt {} (attempt {} won)",
                        stage,
                        partition,
                        attempt,
                        winner
                    );
                }
                Ok(CommitReply::Decision { authorized })
            }
            CommitMessage::StageEnd { stage } => {
                self.decisions.retain(|(s, _), _| *s != stage);
                Ok(CommitReply::Ack)
            }
        }
    }

    /// Builds the endpoint handler serving this state.
    pub fn handler(state: Arc<Self>) -> EndpointHandlerFn {
        Arc::new(move |payload| {
            let state = state.clone();
            Box::pin(async move {
                let msg: CommitMessage = serde_json::from_value(payload)?;
                let reply = state.handle(msg)?;
                Ok(serde_json::to_value(reply)?)
            }) as _
        })
    }

    pub fn decision_count(&self) -> usize {
        self.decisions.len()
    }

    pub fn clear(&self) {
        self.decisions.clear();
    }
}

/// Output-commit arbitration as seen by the rest of the node.
///
/// Constructed before its endpoint exists (the composition root wires the
/// endpoint right after), so the endpoint is attached separately.
pub struct CommitArbitrator {
    authority: Option<Arc<ArbitratorState>>,
    endpoint: Mutex<Option<EndpointRef>>,
}

impl CommitArbitrator {
    pub fn new(is_coordinator: bool) -> Arc<Self> {
        Arc::new(Self {
            authority: is_coordinator.then(ArbitratorState::new),
            endpoint: Mutex::new(None),
        })
    }

    /// Authority state backing the coordinator-side endpoint.
    pub fn state(&self) -> Option<Arc<ArbitratorState>> {
        self.authority.clone()
    }

    pub fn is_authoritative(&self) -> bool {
        self.authority.is_some()
    }

    pub fn attach_endpoint(&self, endpoint: EndpointRef) {
        *self.endpoint.lock().unwrap() = Some(endpoint);
    }

    fn endpoint(&self) -> Result<EndpointRef> {
        self.endpoint
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("commit arbitrator endpoint not wired"))
    }

    pub async fn can_commit(&self, stage: u32, partition: u32, attempt: u32) -> Result<bool> {
        let reply: CommitReply = self
            .endpoint()?
            .ask_as(&CommitMessage::CanCommit {
                stage,
                partition,
                attempt,
            })
            .await?;
        match reply {
            CommitReply::Decision { authorized } => Ok(authorized),
            CommitReply::Ack => Err(anyhow::anyhow!("unexpected arbitrator reply")),
        }
    }

    pub async fn stage_end(&self, stage: u32) -> Result<()> {
        let reply: CommitReply = self
            .endpoint()?
            .ask_as(&CommitMessage::StageEnd { stage })
            .await?;
        match reply {
            CommitReply::Ack => Ok(()),
            CommitReply::Decision { .. } => Err(anyhow::anyhow!("unexpected arbitrator reply")),
        }
    }

    /// Drops decision state on the coordinator; workers only log.
    pub fn stop(&self) {
        if let Some(state) = &self.authority {
            state.clear();
        }
        tracing::debug!("Commit arbitrator stopped");
    }
}
