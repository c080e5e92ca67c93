use anyhow::Result;
use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

use super::handlers::{handle_ask, handle_check};
use super::protocol::ENDPOINT_ASK;
use super::security::SecurityManager;
use super::types::RpcAddress;

/// Type alias for a thread-safe, asynchronous endpoint handler.
/// It takes the message payload and returns a Future resolving to the reply.
pub type EndpointHandlerFn = Arc<
    dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>
        + Send
        + Sync,
>;

/// The node's messaging runtime: one HTTP server dispatching to named
/// endpoint handlers.
pub struct MessagingServer {
    advertised_host: String,
    bound_port: u16,
    endpoints: Arc<DashMap<String, EndpointHandlerFn>>,
    shutdown: Arc<Notify>,
    stopped: AtomicBool,
}

impl MessagingServer {
    /// Binds `(host, requested_port)` and starts serving. Port 0 asks the
    /// kernel for any free port; the actually bound port is reported by
    /// [`MessagingServer::address`].
    pub async fn start(
        host: &str,
        requested_port: u16,
        security: Arc<SecurityManager>,
    ) -> Result<Arc<Self>> {
        let listener = tokio::net::TcpListener::bind((host, requested_port)).await?;
        let bound_port = listener.local_addr()?.port();

        let endpoints: Arc<DashMap<String, EndpointHandlerFn>> = Arc::new(DashMap::new());
        let shutdown = Arc::new(Notify::new());

        let app = Router::new()
            .route(ENDPOINT_ASK, post(handle_ask))
            .route("/rpc/check/:name", get(handle_check))
            .layer(Extension(endpoints.clone()))
            .layer(Extension(security));

        let notify = shutdown.clone();
        tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { notify.notified().await });
            if let Err(e) = serve.await {
                tracing::error!("Messaging runtime exited with error: {}", e);
            }
        });

        tracing::info!("Messaging runtime listening on {}:{}", host, bound_port);

        Ok(Arc::new(Self {
            advertised_host: host.to_string(),
            bound_port,
            endpoints,
            shutdown,
            stopped: AtomicBool::new(false),
        }))
    }

    /// Registers a handler function under an endpoint name.
    pub fn register_endpoint<F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        // Box::pin type-erases the concrete Future so heterogeneous
        // handlers share one registry.
        let handler_fn: EndpointHandlerFn = Arc::new(move |payload| {
            Box::pin(handler(payload))
                as Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>
        });
        self.register_endpoint_fn(name, handler_fn);
    }

    /// Registers an already type-erased handler.
    pub fn register_endpoint_fn(&self, name: &str, handler: EndpointHandlerFn) {
        self.endpoints.insert(name.to_string(), handler);
        tracing::info!("Registered endpoint: {}", name);
    }

    pub fn has_endpoint(&self, name: &str) -> bool {
        self.endpoints.contains_key(name)
    }

    /// Advertised address with the actually bound port.
    pub fn address(&self) -> RpcAddress {
        RpcAddress::new(&self.advertised_host, self.bound_port)
    }

    pub fn bound_port(&self) -> u16 {
        self.bound_port
    }

    /// Stops accepting requests. In-flight handlers finish.
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        // notify_one stores a permit, so a shutdown signaled before the
        // serve task first polls is not lost.
        self.shutdown.notify_one();
        tracing::info!("Messaging runtime on port {} shut down", self.bound_port);
    }

    pub fn is_shut_down(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
