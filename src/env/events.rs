use std::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Engine lifecycle events posted by node-local services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    EnvironmentReady { executor_id: String },
    ApplicationStarted { app_id: String },
    EnvironmentStopped { executor_id: String },
}

/// Listener bus for lifecycle events. Posting is best-effort: closed
/// subscribers are dropped, nobody blocks.
pub struct EventBus {
    subscribers: Mutex<Vec<UnboundedSender<EngineEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> UnboundedReceiver<EngineEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    pub fn post(&self, event: EngineEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        tracing::trace!("Posted {:?} to {} subscriber(s)", event, subscribers.len());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
