//! The downstream queue boundary used by listener hooks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::QueueError;

/// Publish capability handed to every listener at construction.
#[async_trait]
pub trait QueueConnector: Send + Sync + 'static {
    /// Publish `payload` under `route`.
    async fn publish(&self, route: &str, payload: Value) -> Result<(), QueueError>;
}

/// A message recorded by [`MemoryQueue`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub route: String,
    pub payload: Value,
}

/// In-process queue that keeps every published message.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    messages: Arc<Mutex<Vec<QueuedMessage>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    pub fn messages(&self) -> Vec<QueuedMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages published under `route`.
    pub fn on_route(&self, route: &str) -> Vec<Value> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|m| m.route == route)
            .map(|m| m.payload.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject all further publishes with [`QueueError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueueConnector for MemoryQueue {
    async fn publish(&self, route: &str, payload: Value) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(QueuedMessage {
                route: route.to_string(),
                payload,
            });
        Ok(())
    }
}
