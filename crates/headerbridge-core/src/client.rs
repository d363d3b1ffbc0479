//! The `ChainClient` capability — read access to the watched chain.

use async_trait::async_trait;

use crate::channel::DeliverySender;
use crate::error::ChainClientError;
use crate::types::{BlockSelector, Header};

/// Read access to the watched chain's headers.
///
/// # Thread Safety
/// One client is shared as `Arc<dyn ChainClient>` by every listener of a
/// node, so implementations must tolerate concurrent calls.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    /// Fetch the header selected by `selector`. `Ok(None)` means the node
    /// answered but has no such header (yet).
    async fn header_by_number(
        &self,
        selector: BlockSelector,
    ) -> Result<Option<Header>, ChainClientError>;

    /// Start pushing new heads into `sink`.
    ///
    /// The returned [`Subscription`] owns the feed; `sink` must only be used
    /// by that feed. Clients without push support keep the default.
    async fn subscribe_new_head(
        &self,
        sink: DeliverySender,
    ) -> Result<Box<dyn Subscription>, ChainClientError> {
        drop(sink);
        Err(ChainClientError::Unsupported)
    }

    /// Identifier used in logs (URL or name).
    fn endpoint(&self) -> &str;
}

/// An active push feed of new heads.
#[async_trait]
pub trait Subscription: Send {
    /// Resolves with the error that terminated the feed.
    async fn err(&mut self) -> ChainClientError;

    /// Tear down the feed. Idempotent.
    fn unsubscribe(&mut self);
}
