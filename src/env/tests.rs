//! Runtime Environment Tests
//!
//! ## Test Scopes
//! - **Composition**: full coordinator and worker environments built
//!   against real sockets, including the failure path with no side effects.
//! - **Shutdown**: fixed teardown order and the second-call policy.
//! - **Singleton**: overwrite semantics of the process-wide slot.
//! - **Metadata cache / diagnostics / events**: aggregate-owned scratch
//!   services.

#[cfg(test)]
mod tests {
    use crate::config::keys;
    use crate::config::settings::EngineConfig;
    use crate::env::create::{create_coordinator_env, create_worker_env};
    use crate::env::diagnostics::DiagnosticReport;
    use crate::env::environment::{self, COORDINATOR_EXECUTOR_ID, RuntimeEnv};
    use crate::env::events::{EngineEvent, EventBus};
    use crate::env::metadata_cache::MetadataCache;
    use crate::error::RuntimeError;
    use crate::shuffle::manager::HASH_SHUFFLE_MANAGER;
    use crate::storage::protocol::BlockServerId;
    use std::sync::Arc;

    fn coordinator_config() -> EngineConfig {
        let config = EngineConfig::new();
        config.set(keys::COORDINATOR_HOST, "127.0.0.1");
        config.set(keys::COORDINATOR_PORT, "0");
        config
    }

    async fn coordinator_env() -> Arc<RuntimeEnv> {
        create_coordinator_env(coordinator_config(), EventBus::new(), true, None)
            .await
            .unwrap()
    }

    // ============================================================
    // TEST GROUP 1: composition
    // ============================================================

    #[tokio::test]
    async fn test_coordinator_environment_comes_up_live() {
        // ARRANGE: host present, port 0, hash shuffle strategy
        let config = coordinator_config();
        config.set(keys::SHUFFLE_MANAGER, "hash");

        // ACT
        let env = create_coordinator_env(config.clone(), EventBus::new(), true, None)
            .await
            .unwrap();

        // ASSERT
        assert!(!env.is_stopped());
        assert_ne!(env.messaging.bound_port(), 0);
        assert_eq!(
            config.get_u16(keys::RPC_BOUND_PORT, 0),
            env.messaging.bound_port()
        );
        assert_eq!(env.shuffle_manager.name(), HASH_SHUFFLE_MANAGER);
        assert_eq!(env.role.executor_id, COORDINATOR_EXECUTOR_ID);
        assert!(env.role.is_coordinator);
        assert!(env.shuffle_tracker.is_authoritative());
        assert!(env.storage_master.is_authoritative());
        assert!(env.commit_arbitrator.is_authoritative());

        // File server present, address published back for discovery.
        assert!(env.file_server.is_some());
        assert!(config.contains(keys::FILE_SERVER_ADDRESS));

        // Metrics deferred until an application id arrives.
        assert!(!env.metrics.is_started());

        // Ephemeral user-files directory, not the working directory.
        assert!(env.user_files_dir.is_dir());
        assert_ne!(env.user_files_dir, std::env::current_dir().unwrap());

        env.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_host_fails_before_any_service_starts() {
        // ARRANGE: port configured, host absent
        let config = EngineConfig::new();
        config.set(keys::COORDINATOR_PORT, "0");

        // ACT
        let err = create_coordinator_env(config.clone(), EventBus::new(), false, None)
            .await
            .unwrap_err();

        // ASSERT: typed failure, and no messaging runtime was bound
        match err.downcast_ref::<RuntimeError>() {
            Some(RuntimeError::Configuration(key)) => {
                assert_eq!(key, keys::COORDINATOR_HOST);
            }
            other => panic!("expected Configuration error, got {:?}", other),
        }
        assert!(!config.contains(keys::RPC_BOUND_PORT));
    }

    #[tokio::test]
    async fn test_malformed_port_is_a_configuration_error() {
        let config = EngineConfig::new();
        config.set(keys::COORDINATOR_HOST, "127.0.0.1");
        config.set(keys::COORDINATOR_PORT, "not-a-port");

        let err = create_coordinator_env(config, EventBus::new(), false, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RuntimeError>(),
            Some(RuntimeError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_worker_environment_resolves_coordinator_services() {
        // ARRANGE: a live coordinator
        let coordinator = coordinator_env().await;
        let coordinator_port = coordinator.messaging.bound_port();

        let worker_config = EngineConfig::new();
        worker_config.set(keys::COORDINATOR_HOST, "127.0.0.1");
        worker_config.set(keys::COORDINATOR_PORT, &coordinator_port.to_string());
        worker_config.set(keys::APP_ID, "app-test");

        // ACT
        let worker = create_worker_env(worker_config, "exec-1", "127.0.0.1", 0, false)
            .await
            .unwrap();

        // ASSERT: worker side is a read-through client everywhere
        assert!(!worker.role.is_coordinator);
        assert!(!worker.shuffle_tracker.is_authoritative());
        assert!(!worker.storage_master.is_authoritative());
        assert!(!worker.commit_arbitrator.is_authoritative());
        assert!(worker.file_server.is_none());
        assert!(worker.metrics.is_started());
        assert_eq!(worker.metrics.app_id(), Some("app-test".to_string()));
        assert_eq!(worker.user_files_dir, std::env::current_dir().unwrap());

        // A location registered through the worker lands in the
        // coordinator's authoritative state.
        worker
            .shuffle_tracker
            .register_output(
                5,
                0,
                BlockServerId {
                    executor_id: "exec-1".to_string(),
                    host: "127.0.0.1".to_string(),
                    port: worker.messaging.bound_port(),
                },
            )
            .await
            .unwrap();
        let outputs = coordinator.shuffle_tracker.get_outputs(5).await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].1.executor_id, "exec-1");

        // The commit decision made through the worker binds cluster-wide.
        assert!(worker.commit_arbitrator.can_commit(1, 0, 3).await.unwrap());
        assert!(!coordinator.commit_arbitrator.can_commit(1, 0, 4).await.unwrap());

        worker.stop().await.unwrap();
        coordinator.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_without_coordinator_address_fails() {
        let config = EngineConfig::new();

        let err = create_worker_env(config, "exec-1", "127.0.0.1", 0, false)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RuntimeError>(),
            Some(RuntimeError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_block_manager_needs_explicit_initialize() {
        let env = coordinator_env().await;

        assert!(!env.block_manager.is_initialized());
        assert!(env.block_manager.put("b", vec![1]).await.is_err());

        env.block_manager.initialize("app-1").await.unwrap();
        env.block_manager.put("b", vec![1]).await.unwrap();
        assert_eq!(env.block_manager.get_local("b").unwrap(), Some(vec![1]));

        env.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_user_file_is_served_over_http() {
        let env = coordinator_env().await;
        let file_server = env.file_server.as_ref().unwrap();

        let source = env.user_files_dir.join("job.toml");
        std::fs::write(&source, b"threads = 8").unwrap();
        let url = file_server.add_file(&source).unwrap();

        let fetched = reqwest::get(&url).await.unwrap().bytes().await.unwrap();

        assert_eq!(fetched.as_ref(), b"threads = 8");
        env.stop().await.unwrap();
    }

    // ============================================================
    // TEST GROUP 2: shutdown
    // ============================================================

    #[tokio::test]
    async fn test_stop_order_is_fixed_and_messaging_is_last() {
        let env = coordinator_env().await;

        env.stop().await.unwrap();

        let trace = env.stop_trace();
        assert_eq!(
            trace,
            vec![
                "worker_pool",
                "file_server",
                "shuffle_tracker",
                "shuffle_manager",
                "broadcast",
                "block_manager",
                "storage_master",
                "metrics",
                "commit_arbitrator",
                "messaging",
            ]
        );
        assert!(env.is_stopped());
        assert!(env.worker_pool.is_stopped());
        assert!(env.messaging.is_shut_down());
    }

    #[tokio::test]
    async fn test_worker_stop_skips_the_file_server_step() {
        let coordinator = coordinator_env().await;
        let worker_config = EngineConfig::new();
        worker_config.set(keys::COORDINATOR_HOST, "127.0.0.1");
        worker_config.set(
            keys::COORDINATOR_PORT,
            &coordinator.messaging.bound_port().to_string(),
        );
        let worker = create_worker_env(worker_config, "exec-2", "127.0.0.1", 0, false)
            .await
            .unwrap();

        worker.stop().await.unwrap();

        let trace = worker.stop_trace();
        assert!(!trace.contains(&"file_server"));
        assert_eq!(trace.first(), Some(&"worker_pool"));
        assert_eq!(trace.last(), Some(&"messaging"));

        coordinator.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_second_stop_is_a_logged_noop() {
        let env = coordinator_env().await;

        env.stop().await.unwrap();
        let trace_after_first = env.stop_trace().len();

        // Pinned policy: complete without error, touch nothing.
        env.stop().await.unwrap();

        assert!(env.is_stopped());
        assert_eq!(env.stop_trace().len(), trace_after_first);
    }

    // ============================================================
    // TEST GROUP 3: singleton
    // ============================================================

    #[tokio::test]
    async fn test_singleton_slot_overwrites_unconditionally() {
        let first = coordinator_env().await;
        let second = coordinator_env().await;

        environment::set_env(first.clone());
        assert!(Arc::ptr_eq(&environment::get_env().unwrap(), &first));

        environment::set_env(second.clone());
        assert!(Arc::ptr_eq(&environment::get_env().unwrap(), &second));

        environment::clear_env();
        assert!(environment::get_env().is_none());

        first.stop().await.unwrap();
        second.stop().await.unwrap();
    }

    // ============================================================
    // TEST GROUP 4: metadata cache, diagnostics, events
    // ============================================================

    #[test]
    fn test_metadata_cache_roundtrip_and_legal_miss() {
        let cache = MetadataCache::new(100);

        cache.insert("stage.1.plan", Arc::new("plan-bytes".to_string()));

        assert_eq!(
            cache.get_as::<String>("stage.1.plan").as_deref(),
            Some(&"plan-bytes".to_string())
        );
        // Never inserted: always a miss.
        assert!(cache.get("stage.2.plan").is_none());
        // Wrong type: also a miss.
        assert!(cache.get_as::<u64>("stage.1.plan").is_none());
    }

    #[test]
    fn test_metadata_cache_reclaims_instead_of_failing() {
        let cache = MetadataCache::new(2);

        // Inserting past capacity must never fail; entries may vanish.
        for i in 0..5 {
            cache.insert(&format!("key-{}", i), Arc::new(i));
        }

        assert!(cache.len() <= 2);
        // A miss on a previously inserted key is a legal outcome; callers
        // recompute.
        let hits = (0..5)
            .filter(|i| cache.get(&format!("key-{}", i)).is_some())
            .count();
        assert!(hits <= 2);
    }

    #[test]
    fn test_diagnostic_report_has_four_sorted_sections() {
        let config = EngineConfig::new();
        config.set(keys::SHUFFLE_MANAGER, "hash");
        config.set(keys::COORDINATOR_HOST, "10.1.2.3");

        let report = DiagnosticReport::collect(&config);

        let sections = report.sections();
        assert_eq!(sections.len(), 4);
        for (title, pairs) in &sections {
            let mut sorted = pairs.to_vec();
            sorted.sort();
            assert_eq!(&sorted, pairs, "section {} must be sorted", title);
        }
        assert!(
            report
                .engine_config
                .contains(&(keys::COORDINATOR_HOST.to_string(), "10.1.2.3".to_string()))
        );
        assert!(!report.runtime.is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_events_reach_subscribers() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();

        let env = create_coordinator_env(coordinator_config(), bus, true, None)
            .await
            .unwrap();
        env.stop().await.unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            EngineEvent::EnvironmentReady {
                executor_id: COORDINATOR_EXECUTOR_ID.to_string()
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            EngineEvent::EnvironmentStopped {
                executor_id: COORDINATOR_EXECUTOR_ID.to_string()
            }
        );
    }
}
