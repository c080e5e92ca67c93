//! Shuffle Module Tests
//!
//! ## Test Scopes
//! - **Tracker**: register/lookup of output locations through the endpoint
//!   handler, coordinator and worker views.
//! - **Manager**: alias resolution and block-id layout per strategy.
//! - **Memory**: budget accounting under acquire/release.

#[cfg(test)]
mod tests {
    use crate::config::keys;
    use crate::config::settings::EngineConfig;
    use crate::rpc::endpoint::EndpointRef;
    use crate::shuffle::manager::{self, HASH_SHUFFLE_MANAGER, SORT_SHUFFLE_MANAGER};
    use crate::shuffle::memory::ShuffleMemoryTracker;
    use crate::shuffle::tracker::{ShuffleLocationTracker, TrackerState};
    use crate::storage::protocol::BlockServerId;

    fn server(executor_id: &str) -> BlockServerId {
        BlockServerId {
            executor_id: executor_id.to_string(),
            host: "127.0.0.1".to_string(),
            port: 7100,
        }
    }

    fn coordinator_tracker() -> ShuffleLocationTracker {
        let state = TrackerState::new();
        let endpoint = EndpointRef::Local {
            name: "shuffle-tracker".to_string(),
            handler: TrackerState::handler(state.clone()),
        };
        ShuffleLocationTracker::coordinator(state, endpoint)
    }

    // ============================================================
    // TRACKER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_tracker_register_and_fetch_outputs() {
        // ARRANGE
        let tracker = coordinator_tracker();
        tracker.register_shuffle(1, 4).await.unwrap();

        // ACT
        tracker.register_output(1, 2, server("exec-a")).await.unwrap();
        tracker.register_output(1, 0, server("exec-b")).await.unwrap();
        let outputs = tracker.get_outputs(1).await.unwrap();

        // ASSERT: sorted by partition
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].0, 0);
        assert_eq!(outputs[0].1.executor_id, "exec-b");
        assert_eq!(outputs[1].0, 2);
        assert_eq!(outputs[1].1.executor_id, "exec-a");
    }

    #[tokio::test]
    async fn test_tracker_unknown_shuffle_is_empty() {
        let tracker = coordinator_tracker();

        let outputs = tracker.get_outputs(99).await.unwrap();

        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn test_tracker_unregister_drops_state() {
        let tracker = coordinator_tracker();
        tracker.register_shuffle(7, 2).await.unwrap();
        tracker.register_output(7, 0, server("exec-a")).await.unwrap();

        tracker.unregister_shuffle(7).await.unwrap();

        assert!(tracker.get_outputs(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_worker_view_reads_through_shared_state() {
        // ARRANGE: worker holds only the endpoint over the same state
        let state = TrackerState::new();
        let endpoint = EndpointRef::Local {
            name: "shuffle-tracker".to_string(),
            handler: TrackerState::handler(state.clone()),
        };
        let coordinator =
            ShuffleLocationTracker::coordinator(state.clone(), endpoint.clone());
        let worker = ShuffleLocationTracker::worker(endpoint);

        // ACT
        coordinator.register_output(3, 1, server("exec-c")).await.unwrap();

        // ASSERT
        assert!(!worker.is_authoritative());
        let outputs = worker.get_outputs(3).await.unwrap();
        assert_eq!(outputs, vec![(1, server("exec-c"))]);
    }

    // ============================================================
    // MANAGER TESTS
    // ============================================================

    #[test]
    fn test_short_alias_resolves_to_full_identifier() {
        let registry = manager::registry();
        let config = EngineConfig::new();
        config.set(keys::SHUFFLE_MANAGER, "hash");

        let resolved = registry
            .resolve_from_config(
                &config,
                keys::SHUFFLE_MANAGER,
                keys::DEFAULT_SHUFFLE_MANAGER,
                true,
            )
            .unwrap();

        assert_eq!(resolved.name(), HASH_SHUFFLE_MANAGER);
        assert_eq!(manager::canonical_name(&config), HASH_SHUFFLE_MANAGER);
    }

    #[test]
    fn test_default_shuffle_manager_is_sort() {
        let registry = manager::registry();
        let config = EngineConfig::new();

        let resolved = registry
            .resolve_from_config(
                &config,
                keys::SHUFFLE_MANAGER,
                keys::DEFAULT_SHUFFLE_MANAGER,
                false,
            )
            .unwrap();

        assert_eq!(resolved.name(), SORT_SHUFFLE_MANAGER);
    }

    #[test]
    fn test_block_layout_differs_between_strategies() {
        let registry = manager::registry();
        let config = EngineConfig::new();

        let hash = registry.resolve("hash", &config, false).unwrap();
        let sort = registry.resolve("sort", &config, false).unwrap();

        // Hash lays one block per reducer; sort consolidates per map task.
        assert_ne!(
            hash.shuffle_block_id(1, 0, 0),
            hash.shuffle_block_id(1, 0, 1)
        );
        assert_eq!(
            sort.shuffle_block_id(1, 0, 0),
            sort.shuffle_block_id(1, 0, 1)
        );
    }

    // ============================================================
    // MEMORY TESTS
    // ============================================================

    #[test]
    fn test_memory_budget_is_never_exceeded() {
        let tracker = ShuffleMemoryTracker::new(1000);

        assert!(tracker.try_acquire(1, 600));
        assert!(!tracker.try_acquire(2, 600));
        assert!(tracker.try_acquire(2, 400));
        assert_eq!(tracker.used(), 1000);
    }

    #[test]
    fn test_release_returns_bytes_to_budget() {
        let tracker = ShuffleMemoryTracker::new(1000);
        assert!(tracker.try_acquire(1, 800));

        tracker.release(1, 500);

        assert_eq!(tracker.used(), 300);
        assert!(tracker.try_acquire(2, 700));
    }

    #[test]
    fn test_release_all_clears_task_reservation() {
        let tracker = ShuffleMemoryTracker::new(1000);
        assert!(tracker.try_acquire(5, 300));
        assert!(tracker.try_acquire(5, 200));

        let released = tracker.release_all(5);

        assert_eq!(released, 500);
        assert_eq!(tracker.used(), 0);
        assert_eq!(tracker.release_all(5), 0);
    }
}
