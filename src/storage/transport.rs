use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::protocol::{
    BlockServerId, FetchBlockRequest, FetchBlockResponse, TcpFetchRequest, TcpFetchResponse,
    block_endpoint,
};
use crate::config::keys;
use crate::config::settings::EngineConfig;
use crate::rpc::endpoint::RpcClient;
use crate::rpc::types::RpcAddress;

const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// Block-transfer wire implementation, selected by configuration.
///
/// - `http`: block requests ride the messaging runtime as a per-node
///   endpoint; the block server port is the messaging port.
/// - `tcp`: a dedicated listener speaks length-prefixed bincode frames; the
///   block server port is the listener's port.
pub enum BlockTransport {
    Http(HttpBlockTransport),
    Tcp(TcpBlockTransport),
}

impl BlockTransport {
    /// Builds the transport named by the config selector. Exactly two
    /// values are accepted.
    pub fn from_config(config: &EngineConfig, client: Arc<RpcClient>) -> Result<Self> {
        let kind = config.get_or(keys::BLOCK_TRANSPORT, keys::DEFAULT_BLOCK_TRANSPORT);
        match kind.as_str() {
            "http" => Ok(BlockTransport::Http(HttpBlockTransport { client })),
            "tcp" => Ok(BlockTransport::Tcp(TcpBlockTransport)),
            other => Err(anyhow::anyhow!(
                "unknown block transport `{}` (expected `http` or `tcp`)",
                other
            )),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BlockTransport::Http(_) => "http",
            BlockTransport::Tcp(_) => "tcp",
        }
    }

    /// Fetches a block from a remote block server. `None` means the remote
    /// node does not hold the block.
    pub async fn fetch(&self, server: &BlockServerId, block_id: &str) -> Result<Option<Vec<u8>>> {
        match self {
            BlockTransport::Http(http) => http.fetch(server, block_id).await,
            BlockTransport::Tcp(tcp) => tcp.fetch(server, block_id).await,
        }
    }
}

/// Fetch over the messaging runtime.
pub struct HttpBlockTransport {
    client: Arc<RpcClient>,
}

impl HttpBlockTransport {
    async fn fetch(&self, server: &BlockServerId, block_id: &str) -> Result<Option<Vec<u8>>> {
        let addr = RpcAddress::new(&server.host, server.port);
        let request = FetchBlockRequest {
            block_id: block_id.to_string(),
        };
        let reply = self
            .client
            .ask(
                &addr,
                &block_endpoint(&server.executor_id),
                serde_json::to_value(&request)?,
            )
            .await?;
        let response: FetchBlockResponse = serde_json::from_value(reply)?;
        Ok(response.bytes)
    }
}

/// Fetch over a dedicated TCP listener with length-prefixed bincode frames.
pub struct TcpBlockTransport;

impl TcpBlockTransport {
    async fn fetch(&self, server: &BlockServerId, block_id: &str) -> Result<Option<Vec<u8>>> {
        let mut stream = TcpStream::connect((server.host.as_str(), server.port)).await?;

        let request = TcpFetchRequest {
            block_id: block_id.to_string(),
        };
        write_frame(&mut stream, &bincode::serialize(&request)?).await?;

        let frame = read_frame(&mut stream).await?;
        let response: TcpFetchResponse = bincode::deserialize(&frame)?;
        Ok(response.bytes)
    }
}

/// Binds the TCP block listener on `(host, 0)` and serves `blocks` until
/// the returned task is aborted. Returns the bound port and the serve task.
pub async fn serve_tcp(
    host: &str,
    blocks: Arc<DashMap<String, Vec<u8>>>,
) -> Result<(u16, tokio::task::JoinHandle<()>)> {
    let listener = TcpListener::bind((host, 0)).await?;
    let port = listener.local_addr()?.port();

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let blocks = blocks.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, blocks).await {
                            tracing::debug!("Block connection from {} ended: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Block listener accept failed: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }
    });

    tracing::info!("TCP block transport listening on {}:{}", host, port);
    Ok((port, handle))
}

async fn serve_connection(
    mut stream: TcpStream,
    blocks: Arc<DashMap<String, Vec<u8>>>,
) -> Result<()> {
    loop {
        let frame = read_frame(&mut stream).await?;
        let request: TcpFetchRequest = bincode::deserialize(&frame)?;

        let bytes = blocks.get(&request.block_id).map(|entry| entry.value().clone());
        let response = TcpFetchResponse { bytes };
        write_frame(&mut stream, &bincode::serialize(&response)?).await?;
    }
}

async fn write_frame(stream: &mut TcpStream, bytes: &[u8]) -> Result<()> {
    stream.write_u32(bytes.len() as u32).await?;
    stream.write_all(bytes).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_frame(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let len = stream.read_u32().await?;
    if len > MAX_FRAME_BYTES {
        return Err(anyhow::anyhow!("block frame too large: {} bytes", len));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await?;
    Ok(buf)
}
