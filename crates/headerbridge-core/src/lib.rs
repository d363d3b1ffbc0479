//! headerbridge-core — the chain-header listener that keeps a validator in
//! step with an external root chain.
//!
//! # Architecture
//!
//! ```text
//! BaseListener (Created → Started → Stopped)
//!     ├── acquisition task  (poll ticker  XOR  push subscription)
//!     │        │
//!     │        ▼  DeliveryChannel (rendezvous, single producer / single consumer)
//!     │        │
//!     └── processing task ──► HeaderHook::process_header (one header at a time)
//!                                   └── QueueConnector / broadcast (variant-specific)
//! ```
//!
//! Both tasks hang off one root cancellation token: the exit of either tears
//! down the other, and [`BaseListener::stop`] waits for both.

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod listener;
pub mod logger;
pub mod processor;
pub mod queue;
pub mod relay;
pub mod source;
pub mod types;

pub use channel::{delivery_channel, DeliveryClosed, DeliveryReceiver, DeliverySender};
pub use client::{ChainClient, Subscription};
pub use config::{AcquisitionMode, ListenerBuilder, ListenerConfig};
pub use error::{ChainClientError, ListenerError, QueueError};
pub use lifecycle::{BaseListener, ListenerState};
pub use listener::{HeaderHook, Listener};
pub use logger::{Logger, LoggerHandle};
pub use processor::ProcessorStats;
pub use queue::{MemoryQueue, QueueConnector};
pub use relay::HeaderRelay;
pub use source::AcquisitionExit;
pub use types::{BlockSelector, Header};
