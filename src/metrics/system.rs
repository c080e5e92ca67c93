use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::keys;
use crate::config::settings::EngineConfig;

/// Named counters plus a background report loop.
pub struct MetricsSystem {
    role_label: String,
    interval: Duration,
    counters: DashMap<String, AtomicI64>,
    app_id: Mutex<Option<String>>,
    report_task: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl MetricsSystem {
    pub fn new(role_label: &str, config: &EngineConfig) -> Arc<Self> {
        let interval = Duration::from_millis(
            config.get_u64(keys::METRICS_INTERVAL_MS, keys::DEFAULT_METRICS_INTERVAL_MS),
        );
        Arc::new(Self {
            role_label: role_label.to_string(),
            interval,
            counters: DashMap::new(),
            app_id: Mutex::new(None),
            report_task: Mutex::new(None),
            started: AtomicBool::new(false),
        })
    }

    pub fn inc(&self, name: &str, delta: i64) {
        self.counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicI64::new(0))
            .fetch_add(delta, Ordering::SeqCst);
    }

    pub fn counter(&self, name: &str) -> i64 {
        self.counters
            .get(name)
            .map(|entry| entry.value().load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Sorted snapshot of every counter.
    pub fn snapshot(&self) -> Vec<(String, i64)> {
        let mut all: Vec<(String, i64)> = self
            .counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::SeqCst)))
            .collect();
        all.sort();
        all
    }

    /// Starts the report loop under the given application id. A second
    /// call is ignored.
    pub fn start(self: &Arc<Self>, app_id: &str) {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("Metrics system already started");
            return;
        }
        *self.app_id.lock().unwrap() = Some(app_id.to_string());

        let system = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(system.interval);
            loop {
                interval.tick().await;
                let snapshot = system.snapshot();
                tracing::info!(
                    "Metrics [{} {}]: {} counter(s)",
                    system.role_label,
                    system.app_id.lock().unwrap().as_deref().unwrap_or("-"),
                    snapshot.len()
                );
                for (name, value) in snapshot {
                    tracing::info!("  {} = {}", name, value);
                }
            }
        });
        *self.report_task.lock().unwrap() = Some(handle);

        tracing::info!("Metrics system started for {} ({})", app_id, self.role_label);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn app_id(&self) -> Option<String> {
        self.app_id.lock().unwrap().clone()
    }

    /// Aborts the report loop. Counters remain readable.
    pub fn stop(&self) {
        if let Some(handle) = self.report_task.lock().unwrap().take() {
            handle.abort();
        }
        tracing::debug!("Metrics system stopped ({})", self.role_label);
    }
}
