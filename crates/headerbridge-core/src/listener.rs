//! The listener variant contract.
//!
//! A concrete listener (root-chain deposits, side-chain checkpoints, …) holds
//! a [`BaseListener`](crate::lifecycle::BaseListener) and hands it a
//! [`HeaderHook`] at construction. The base owns the tasks; the hook owns the
//! reaction to each header.

use async_trait::async_trait;

use crate::error::ListenerError;
use crate::logger::Logger;
use crate::types::Header;

/// Variant-specific reaction to a new header.
///
/// Called exactly once per delivered header, in arrival order, and never
/// concurrently with itself. A hook that does not return stalls the whole
/// listener, and after one header the acquisition task too.
#[async_trait]
pub trait HeaderHook: Send + Sync + 'static {
    async fn process_header(&self, header: &Header) -> Result<(), ListenerError>;
}

/// The public surface every listener exposes to the node.
#[async_trait]
pub trait Listener: Send {
    /// Launch the listener's background tasks. Returns without waiting for
    /// them; only invalid transitions are reported.
    fn start(&mut self) -> Result<(), ListenerError>;

    /// Cancel both tasks and wait for them to exit.
    async fn stop(&mut self) -> Result<(), ListenerError>;

    /// Configured name, for log correlation.
    fn name(&self) -> &str;

    /// Replace the logger. Allowed at any time, including after `start`.
    fn set_logger(&self, logger: Logger);
}
