//! `HeaderRelay` — a reference listener variant that forwards every new head
//! to the queue connector.
//!
//! Polling "latest" returns the same header on every tick until the chain
//! moves, so the hook only publishes headers above the last one it saw. A new
//! head that does not extend the previous one (a gap or a reorg) is still
//! published and flagged in the logs.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::client::ChainClient;
use crate::config::ListenerConfig;
use crate::error::{ChainClientError, ListenerError};
use crate::lifecycle::BaseListener;
use crate::listener::{HeaderHook, Listener};
use crate::logger::Logger;
use crate::queue::QueueConnector;
use crate::types::Header;

struct RelayHook {
    listener: String,
    route: String,
    queue: Arc<dyn QueueConnector>,
    last: Mutex<Option<Header>>,
}

#[async_trait]
impl HeaderHook for RelayHook {
    async fn process_header(&self, header: &Header) -> Result<(), ListenerError> {
        let previous = self
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if let Some(prev) = &previous {
            if header.number <= prev.number {
                tracing::trace!(
                    number = header.number,
                    last = prev.number,
                    "header already relayed"
                );
                return Ok(());
            }
            if !header.extends(prev) {
                tracing::warn!(
                    number = header.number,
                    last = prev.number,
                    parent_hash = %header.parent_hash,
                    "new head does not extend last relayed header"
                );
            }
        }

        let payload = serde_json::to_value(header).map_err(|e| ListenerError::Hook {
            listener: self.listener.clone(),
            reason: e.to_string(),
        })?;
        self.queue.publish(&self.route, payload).await?;

        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(header.clone());
        tracing::info!(
            number = header.number,
            hash = %header.hash,
            route = %self.route,
            "relayed new head"
        );
        Ok(())
    }
}

/// Listener that publishes each new head under `<name>.header`.
pub struct HeaderRelay {
    base: BaseListener,
}

impl HeaderRelay {
    pub fn new<F>(
        config: ListenerConfig,
        client_factory: F,
        queue: Arc<dyn QueueConnector>,
    ) -> Result<Self, ListenerError>
    where
        F: FnOnce() -> Result<Arc<dyn ChainClient>, ChainClientError>,
    {
        let hook = Arc::new(RelayHook {
            listener: config.name.clone(),
            route: Self::route_for(&config.name),
            queue: queue.clone(),
            last: Mutex::new(None),
        });
        let base = BaseListener::new(config, client_factory, queue, hook)?;
        Ok(Self { base })
    }

    /// Queue route used for a listener called `name`.
    pub fn route_for(name: &str) -> String {
        format!("{name}.header")
    }

    pub fn base(&self) -> &BaseListener {
        &self.base
    }

    /// See [`BaseListener::closed`].
    pub async fn closed(&self) {
        self.base.closed().await
    }
}

#[async_trait]
impl Listener for HeaderRelay {
    fn start(&mut self) -> Result<(), ListenerError> {
        self.base.start()
    }

    async fn stop(&mut self) -> Result<(), ListenerError> {
        self.base.stop().await
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    fn set_logger(&self, logger: Logger) {
        self.base.set_logger(logger)
    }
}
