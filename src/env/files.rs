use anyhow::Result;
use axum::{
    Router,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    routing::get,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

use crate::rpc::protocol::AUTH_HEADER;
use crate::rpc::security::SecurityManager;
use crate::rpc::types::RpcAddress;

/// Coordinator-only HTTP server handing user-supplied files and bundles to
/// workers. Serves everything placed in its root directory under
/// `/files/{name}`.
pub struct FileServer {
    root: PathBuf,
    address: RpcAddress,
    shutdown: Arc<Notify>,
    stopped: AtomicBool,
}

impl FileServer {
    pub async fn start(
        host: &str,
        requested_port: u16,
        root: PathBuf,
        security: Arc<SecurityManager>,
    ) -> Result<Arc<Self>> {
        std::fs::create_dir_all(&root)?;

        let listener = tokio::net::TcpListener::bind((host, requested_port)).await?;
        let bound_port = listener.local_addr()?.port();

        let app = Router::new()
            .route("/files/:name", get(handle_fetch_file))
            .layer(Extension(root.clone()))
            .layer(Extension(security));

        let shutdown = Arc::new(Notify::new());
        let notify = shutdown.clone();
        tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { notify.notified().await });
            if let Err(e) = serve.await {
                tracing::error!("File server exited with error: {}", e);
            }
        });

        tracing::info!("File server listening on {}:{}", host, bound_port);

        Ok(Arc::new(Self {
            root,
            address: RpcAddress::new(host, bound_port),
            shutdown,
            stopped: AtomicBool::new(false),
        }))
    }

    /// Copies a file into the served root; returns its fetch URL.
    pub fn add_file(&self, path: &std::path::Path) -> Result<String> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow::anyhow!("file has no usable name: {}", path.display()))?;

        std::fs::copy(path, self.root.join(name))?;
        tracing::info!("Serving user file {}", name);

        Ok(format!("{}/files/{}", self.address.http_base(), name))
    }

    pub fn address(&self) -> &RpcAddress {
        &self.address
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        // notify_one stores a permit, so a shutdown signaled before the
        // serve task first polls is not lost.
        self.shutdown.notify_one();
        tracing::info!("File server on port {} shut down", self.address.port);
    }

    pub fn is_shut_down(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

async fn handle_fetch_file(
    Extension(root): Extension<PathBuf>,
    Extension(security): Extension<Arc<SecurityManager>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> (StatusCode, Vec<u8>) {
    let presented = headers.get(AUTH_HEADER).and_then(|value| value.to_str().ok());
    if !security.check(presented) {
        return (StatusCode::UNAUTHORIZED, Vec::new());
    }

    // Names are flat; anything that could escape the root is rejected.
    if name.contains("..") || name.contains('/') {
        return (StatusCode::BAD_REQUEST, Vec::new());
    }

    match tokio::fs::read(root.join(&name)).await {
        Ok(bytes) => (StatusCode::OK, bytes),
        Err(e) => {
            tracing::debug!("File {} not served: {}", name, e);
            (StatusCode::NOT_FOUND, Vec::new())
        }
    }
}
