//! Error types for the header listener.

use thiserror::Error;

/// Errors surfaced by a listener's public surface and its hooks.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("already started")]
    AlreadyStarted,

    #[error("already stopped")]
    AlreadyStopped,

    #[error("not started")]
    NotStarted,

    /// The chain client could not be obtained at construction time.
    #[error("chain client: {0}")]
    ChainClient(#[from] ChainClientError),

    #[error("invalid listener config: {0}")]
    InvalidConfig(String),

    /// `start` was called outside of a Tokio runtime.
    #[error("no Tokio runtime available to spawn listener tasks")]
    NoRuntime,

    #[error("listener '{listener}' tasks did not exit within {ms}ms")]
    ShutdownTimeout { listener: String, ms: u64 },

    #[error("hook error in '{listener}': {reason}")]
    Hook { listener: String, reason: String },

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl ListenerError {
    /// Returns `true` for the invalid lifecycle transitions.
    pub fn is_transition(&self) -> bool {
        matches!(
            self,
            Self::AlreadyStarted | Self::AlreadyStopped | Self::NotStarted
        )
    }
}

/// Errors returned by a [`ChainClient`](crate::client::ChainClient).
#[derive(Debug, Error)]
pub enum ChainClientError {
    /// RPC transport or node-side failure.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The client could not be constructed or reached at all.
    #[error("chain client unavailable: {0}")]
    Unavailable(String),

    /// The response could not be interpreted as a header.
    #[error("malformed header: {0}")]
    Malformed(String),

    /// Push subscriptions are not supported by this client.
    #[error("new-head subscriptions are not supported")]
    Unsupported,

    /// The subscription feed failed or was closed by the remote side.
    #[error("subscription error: {0}")]
    Subscription(String),
}

impl ChainClientError {
    /// Returns `true` if the next poll tick may reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Rpc(_) | Self::Malformed(_))
    }
}

/// Errors from the downstream queue connector.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue publish to '{route}' failed: {reason}")]
    Publish { route: String, reason: String },

    #[error("queue connector closed")]
    Closed,
}
