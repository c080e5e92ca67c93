use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;

use super::keys;
use crate::error::RuntimeError;

/// Shared configuration map for one node.
///
/// Clones share the underlying storage, so a value written back during
/// startup (e.g. the bound RPC port) is visible through every handle.
#[derive(Clone)]
pub struct EngineConfig {
    entries: Arc<DashMap<String, String>>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        if key == keys::DEPRECATED_CACHE_CLASS {
            tracing::warn!(
                "Configuration key {} is deprecated and ignored",
                keys::DEPRECATED_CACHE_CLASS
            );
        }
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Returns the value for a key that must be present, failing with a
    /// configuration error otherwise.
    pub fn require(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| RuntimeError::Configuration(key.to_string()).into())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get_u16(&self, key: &str, default: u16) -> u16 {
        self.get(key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.get(key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    pub fn get_usize(&self, key: &str, default: usize) -> usize {
        self.get(key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    /// Snapshot of every entry, sorted by key. Used by the diagnostic
    /// report.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut all: Vec<(String, String)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort();
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
