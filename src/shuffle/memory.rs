use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-task shuffle memory accounting against a node-wide byte budget.
///
/// `try_acquire` never over-commits: the budget check and the reservation
/// are one atomic update.
pub struct ShuffleMemoryTracker {
    limit: u64,
    used: AtomicU64,
    per_task: DashMap<u64, u64>,
}

impl ShuffleMemoryTracker {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: AtomicU64::new(0),
            per_task: DashMap::new(),
        }
    }

    /// Reserves `bytes` for `task_id`. Returns false when the budget would
    /// be exceeded.
    pub fn try_acquire(&self, task_id: u64, bytes: u64) -> bool {
        let mut current = self.used.load(Ordering::SeqCst);
        loop {
            if current + bytes > self.limit {
                tracing::debug!(
                    "Task {} denied {} shuffle bytes ({}/{} used)",
                    task_id,
                    bytes,
                    current,
                    self.limit
                );
                return false;
            }
            match self.used.compare_exchange(
                current,
                current + bytes,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        *self.per_task.entry(task_id).or_insert(0) += bytes;
        true
    }

    /// Returns `bytes` of `task_id`'s reservation to the budget.
    pub fn release(&self, task_id: u64, bytes: u64) {
        if let Some(mut held) = self.per_task.get_mut(&task_id) {
            let returned = bytes.min(*held);
            *held -= returned;
            self.used.fetch_sub(returned, Ordering::SeqCst);
        }
    }

    /// Releases everything `task_id` still holds; returns the amount.
    pub fn release_all(&self, task_id: u64) -> u64 {
        match self.per_task.remove(&task_id) {
            Some((_, held)) => {
                self.used.fetch_sub(held, Ordering::SeqCst);
                held
            }
            None => 0,
        }
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}
