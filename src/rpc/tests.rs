//! Messaging Runtime Tests
//!
//! Starts real servers on loopback port 0 and exercises endpoint dispatch,
//! presence checks, resolution, and authentication.

#[cfg(test)]
mod tests {
    use crate::config::keys;
    use crate::config::settings::EngineConfig;
    use crate::error::RuntimeError;
    use crate::rpc::endpoint::{EndpointRef, RpcClient, register_or_resolve};
    use crate::rpc::security::SecurityManager;
    use crate::rpc::server::{EndpointHandlerFn, MessagingServer};
    use std::sync::Arc;
    use std::time::Duration;

    async fn open_server() -> Arc<MessagingServer> {
        let security = Arc::new(SecurityManager::new(&EngineConfig::new()));
        MessagingServer::start("127.0.0.1", 0, security).await.unwrap()
    }

    fn open_client(resolve_timeout: Duration) -> Arc<RpcClient> {
        RpcClient::new(&SecurityManager::new(&EngineConfig::new()), resolve_timeout)
    }

    // ============================================================
    // TEST GROUP 1: binding and dispatch
    // ============================================================

    #[tokio::test]
    async fn test_port_zero_binds_concrete_port() {
        let server = open_server().await;

        assert_ne!(server.bound_port(), 0);
        assert_eq!(server.address().port, server.bound_port());
    }

    #[tokio::test]
    async fn test_remote_ask_roundtrip() {
        // ARRANGE: an echo endpoint on a live server
        let server = open_server().await;
        server.register_endpoint("echo", |payload| async move {
            Ok(serde_json::json!({ "echoed": payload }))
        });

        // ACT
        let client = open_client(Duration::from_secs(1));
        let reply = client
            .ask(&server.address(), "echo", serde_json::json!("ping"))
            .await
            .unwrap();

        // ASSERT
        assert_eq!(reply, serde_json::json!({ "echoed": "ping" }));
    }

    #[tokio::test]
    async fn test_ask_unknown_endpoint_fails() {
        let server = open_server().await;
        let client = open_client(Duration::from_secs(1));

        let result = client
            .ask(&server.address(), "nobody-home", serde_json::Value::Null)
            .await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("unknown endpoint"));
    }

    #[tokio::test]
    async fn test_handler_error_surfaces_to_caller() {
        let server = open_server().await;
        server.register_endpoint("broken", |_payload| async move {
            Err(anyhow::anyhow!("handler exploded"))
        });
        let client = open_client(Duration::from_secs(1));

        let result = client
            .ask(&server.address(), "broken", serde_json::Value::Null)
            .await;

        assert!(result.unwrap_err().to_string().contains("handler exploded"));
    }

    // ============================================================
    // TEST GROUP 2: presence checks and resolution
    // ============================================================

    #[tokio::test]
    async fn test_check_reports_presence() {
        let server = open_server().await;
        server.register_endpoint("present", |_p| async move { Ok(serde_json::Value::Null) });
        let client = open_client(Duration::from_secs(1));

        assert!(client.check(&server.address(), "present").await.unwrap());
        assert!(!client.check(&server.address(), "absent").await.unwrap());
    }

    #[tokio::test]
    async fn test_resolve_times_out_with_endpoint_unavailable() {
        // ARRANGE: a live server that never binds the endpoint
        let server = open_server().await;
        let client = open_client(Duration::from_millis(400));

        // ACT
        let err = client.resolve(&server.address(), "ghost").await.unwrap_err();

        // ASSERT
        match err.downcast_ref::<RuntimeError>() {
            Some(RuntimeError::EndpointUnavailable { name, .. }) => {
                assert_eq!(name, "ghost");
            }
            other => panic!("expected EndpointUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_or_resolve_coordinator_branch_is_local() {
        let server = open_server().await;
        let client = open_client(Duration::from_secs(1));
        let coordinator = server.address();

        let handler: EndpointHandlerFn = Arc::new(|_payload| {
            Box::pin(async move { Ok(serde_json::json!("from-coordinator")) }) as _
        });
        let handle =
            register_or_resolve(true, &server, &client, &coordinator, "tracker", move || handler)
                .await
                .unwrap();

        assert!(handle.is_local());
        assert!(server.has_endpoint("tracker"));
        assert_eq!(
            handle.ask(serde_json::Value::Null).await.unwrap(),
            serde_json::json!("from-coordinator")
        );
    }

    #[tokio::test]
    async fn test_register_or_resolve_worker_branch_resolves_remote() {
        // ARRANGE: coordinator side binds the endpoint first
        let coordinator_server = open_server().await;
        coordinator_server
            .register_endpoint("tracker", |_p| async move { Ok(serde_json::json!(42)) });

        let worker_server = open_server().await;
        let client = open_client(Duration::from_secs(2));
        let coordinator = coordinator_server.address();

        // ACT: the worker branch must ignore the factory entirely
        let handle = register_or_resolve(false, &worker_server, &client, &coordinator, "tracker", || {
            unreachable!("worker branch must not instantiate the factory")
        })
        .await
        .unwrap();

        // ASSERT
        assert!(!handle.is_local());
        assert!(!worker_server.has_endpoint("tracker"));
        assert_eq!(
            handle.ask(serde_json::Value::Null).await.unwrap(),
            serde_json::json!(42)
        );
    }

    // ============================================================
    // TEST GROUP 3: authentication
    // ============================================================

    #[tokio::test]
    async fn test_unauthenticated_ask_is_rejected() {
        // ARRANGE: server requires a secret the client does not have
        let server_config = EngineConfig::new();
        server_config.set(keys::AUTH_SECRET, "cluster-secret");
        let security = Arc::new(SecurityManager::new(&server_config));
        let server = MessagingServer::start("127.0.0.1", 0, security).await.unwrap();
        server.register_endpoint("echo", |payload| async move { Ok(payload) });

        let client = open_client(Duration::from_secs(1));

        // ACT
        let result = client
            .ask(&server.address(), "echo", serde_json::Value::Null)
            .await;

        // ASSERT
        assert!(result.unwrap_err().to_string().contains("authentication failed"));
    }

    #[tokio::test]
    async fn test_matching_secret_is_accepted() {
        let config = EngineConfig::new();
        config.set(keys::AUTH_SECRET, "cluster-secret");
        let security = Arc::new(SecurityManager::new(&config));
        let server = MessagingServer::start("127.0.0.1", 0, security).await.unwrap();
        server.register_endpoint("echo", |payload| async move { Ok(payload) });

        let client = RpcClient::new(
            &SecurityManager::new(&config),
            Duration::from_secs(1),
        );

        let reply = client
            .ask(&server.address(), "echo", serde_json::json!("hello"))
            .await
            .unwrap();

        assert_eq!(reply, serde_json::json!("hello"));
    }

    #[tokio::test]
    async fn test_local_endpoint_ref_dispatches_in_process() {
        let handler: EndpointHandlerFn =
            Arc::new(|payload| Box::pin(async move { Ok(payload) }) as _);
        let handle = EndpointRef::Local {
            name: "loopback".to_string(),
            handler,
        };

        let reply = handle.ask(serde_json::json!({"n": 1})).await.unwrap();

        assert_eq!(reply, serde_json::json!({"n": 1}));
    }
}
