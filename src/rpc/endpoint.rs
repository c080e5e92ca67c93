use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::protocol::{AUTH_HEADER, AskRequest, AskResponse, CheckResponse, ENDPOINT_ASK, ENDPOINT_CHECK};
use super::security::SecurityManager;
use super::server::{EndpointHandlerFn, MessagingServer};
use super::types::RpcAddress;
use crate::error::RuntimeError;

const ASK_TIMEOUT: Duration = Duration::from_secs(10);
const RESOLVE_INITIAL_DELAY_MS: u64 = 150;
const RESOLVE_MAX_DELAY_MS: u64 = 1200;

/// Client side of the messaging runtime.
///
/// `ask` is a single attempt; the core has no automatic retry. Only
/// endpoint resolution polls, bounded by `resolve_timeout`.
pub struct RpcClient {
    http: reqwest::Client,
    auth_token: Option<String>,
    resolve_timeout: Duration,
}

impl RpcClient {
    pub fn new(security: &SecurityManager, resolve_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            http: reqwest::Client::new(),
            auth_token: security.token().map(|token| token.to_string()),
            resolve_timeout,
        })
    }

    fn attach_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.header(AUTH_HEADER, token),
            None => request,
        }
    }

    /// Sends one message to a named endpoint on a remote runtime.
    pub async fn ask(
        &self,
        addr: &RpcAddress,
        endpoint: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let request = AskRequest {
            endpoint: endpoint.to_string(),
            payload,
        };

        let response = self
            .attach_auth(self.http.post(format!("{}{}", addr.http_base(), ENDPOINT_ASK)))
            .json(&request)
            .timeout(ASK_TIMEOUT)
            .send()
            .await?;

        let reply: AskResponse = response.json().await?;
        if !reply.ok {
            return Err(anyhow::anyhow!(
                "ask {} at {} failed: {}",
                endpoint,
                addr,
                reply.error.unwrap_or_else(|| "unknown error".to_string())
            ));
        }

        Ok(reply.payload.unwrap_or(serde_json::Value::Null))
    }

    /// One presence probe against a remote runtime.
    pub async fn check(&self, addr: &RpcAddress, name: &str) -> Result<bool> {
        let url = format!("{}{}/{}", addr.http_base(), ENDPOINT_CHECK, name);
        let response = self
            .attach_auth(self.http.get(url))
            .timeout(ASK_TIMEOUT)
            .send()
            .await?;

        let reply: CheckResponse = response.json().await?;
        Ok(reply.present)
    }

    /// Blocks until the named endpoint answers a presence check, retrying
    /// with backoff and jitter, or fails with `EndpointUnavailable` once the
    /// resolution timeout elapses.
    pub async fn resolve(&self, addr: &RpcAddress, name: &str) -> Result<()> {
        let deadline = Instant::now() + self.resolve_timeout;
        let mut delay_ms = RESOLVE_INITIAL_DELAY_MS;

        loop {
            match self.check(addr, name).await {
                Ok(true) => {
                    tracing::debug!("Resolved endpoint {} at {}", name, addr);
                    return Ok(());
                }
                Ok(false) => {
                    tracing::trace!("Endpoint {} not yet bound at {}", name, addr);
                }
                Err(e) => {
                    tracing::trace!("Presence check for {} at {} failed: {}", name, addr, e);
                }
            }

            if Instant::now() >= deadline {
                return Err(RuntimeError::EndpointUnavailable {
                    name: name.to_string(),
                    address: addr.to_string(),
                }
                .into());
            }

            let jitter = rand::random::<u64>() % 50;
            tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
            delay_ms = (delay_ms * 2).min(RESOLVE_MAX_DELAY_MS);
        }
    }
}

/// Handle to a named endpoint: concrete on the node that registered it, a
/// resolved remote proxy elsewhere. Callers cannot tell the difference.
#[derive(Clone)]
pub enum EndpointRef {
    Local {
        name: String,
        handler: EndpointHandlerFn,
    },
    Remote {
        name: String,
        address: RpcAddress,
        client: Arc<RpcClient>,
    },
}

impl EndpointRef {
    pub fn name(&self) -> &str {
        match self {
            EndpointRef::Local { name, .. } => name,
            EndpointRef::Remote { name, .. } => name,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, EndpointRef::Local { .. })
    }

    /// Sends a message and awaits the reply, in-process or over the wire.
    pub async fn ask(&self, msg: serde_json::Value) -> Result<serde_json::Value> {
        match self {
            EndpointRef::Local { handler, .. } => handler(msg).await,
            EndpointRef::Remote {
                name,
                address,
                client,
            } => client.ask(address, name, msg).await,
        }
    }

    /// Typed wrapper over [`EndpointRef::ask`] for service message enums.
    pub async fn ask_as<M, R>(&self, msg: &M) -> Result<R>
    where
        M: Serialize,
        R: DeserializeOwned,
    {
        let reply = self.ask(serde_json::to_value(msg)?).await?;
        Ok(serde_json::from_value(reply)?)
    }
}

/// Registers an endpoint (coordinator) or resolves it against the
/// coordinator's runtime (worker), returning a uniform handle.
///
/// On the coordinator the factory is instantiated and bound under `name`;
/// on a worker the factory is ignored and resolution blocks until the
/// remote endpoint answers a presence check or the bounded timeout elapses.
pub async fn register_or_resolve<F>(
    is_coordinator: bool,
    server: &MessagingServer,
    client: &Arc<RpcClient>,
    coordinator: &RpcAddress,
    name: &str,
    factory: F,
) -> Result<EndpointRef>
where
    F: FnOnce() -> EndpointHandlerFn,
{
    if is_coordinator {
        let handler = factory();
        server.register_endpoint_fn(name, handler.clone());
        Ok(EndpointRef::Local {
            name: name.to_string(),
            handler,
        })
    } else {
        client.resolve(coordinator, name).await?;
        Ok(EndpointRef::Remote {
            name: name.to_string(),
            address: coordinator.clone(),
            client: client.clone(),
        })
    }
}
