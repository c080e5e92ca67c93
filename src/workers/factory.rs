use anyhow::Result;
use std::collections::BTreeMap;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one worker configuration: which executable, under which
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub executable: String,
    pub env: BTreeMap<String, String>,
}

impl PoolKey {
    pub fn new(executable: &str, env: &BTreeMap<String, String>) -> Self {
        Self {
            executable: executable.to_string(),
            env: env.clone(),
        }
    }
}

/// A live connection to one helper process: the child plus its stdio pipes.
///
/// Dropping a handle kills the process, so a connection that is neither
/// pooled nor destroyed explicitly is still reclaimed.
pub struct WorkerHandle {
    id: u64,
    child: Child,
}

impl WorkerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    fn terminate(&mut self) {
        if let Err(e) = self.child.kill() {
            tracing::debug!("Worker {} already gone: {}", self.id, e);
        }
        // Reap so the child does not linger as a zombie.
        let _ = self.child.wait();
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Owns the idle worker processes for one [`PoolKey`].
pub struct WorkerFactory {
    key: PoolKey,
    idle_limit: usize,
    idle: Mutex<Vec<WorkerHandle>>,
    next_id: AtomicU64,
}

impl WorkerFactory {
    pub fn new(key: PoolKey, idle_limit: usize) -> Self {
        Self {
            key,
            idle_limit,
            idle: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Produces a connection: an idle one when available, a freshly spawned
    /// process otherwise. Spawning can block the caller.
    pub fn create(&self) -> Result<WorkerHandle> {
        if let Some(handle) = self.idle.lock().unwrap().pop() {
            tracing::debug!("Reusing worker {} for {}", handle.id, self.key.executable);
            return Ok(handle);
        }

        let child = Command::new(&self.key.executable)
            .envs(&self.key.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            "Spawned worker {} (pid {}) for {}",
            id,
            child.id(),
            self.key.executable
        );

        Ok(WorkerHandle { id, child })
    }

    /// Returns a connection to the idle set, or terminates it when the set
    /// is at its bound.
    pub fn release(&self, handle: WorkerHandle) {
        let mut idle = self.idle.lock().unwrap();
        if idle.len() < self.idle_limit {
            idle.push(handle);
        } else {
            drop(idle);
            tracing::debug!("Idle bound reached for {}, terminating worker", self.key.executable);
            // Dropping the handle kills the process.
        }
    }

    /// Terminates a connection for good.
    pub fn destroy(&self, mut handle: WorkerHandle) {
        tracing::debug!("Destroying worker {} for {}", handle.id(), self.key.executable);
        handle.terminate();
    }

    /// Terminates every idle connection.
    pub fn stop(&self) {
        let drained: Vec<WorkerHandle> = self.idle.lock().unwrap().drain(..).collect();
        let count = drained.len();
        drop(drained);
        if count > 0 {
            tracing::info!(
                "Stopped {} idle worker(s) for {}",
                count,
                self.key.executable
            );
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap().len()
    }
}

impl Drop for WorkerFactory {
    fn drop(&mut self) {
        self.stop();
    }
}
