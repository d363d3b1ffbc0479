//! Replaceable per-listener logger.
//!
//! A listener's logger is a [`tracing::Span`]; every line its tasks emit is
//! recorded inside it. The span sits in a `watch` channel so that
//! [`BaseListener::set_logger`](crate::lifecycle::BaseListener::set_logger)
//! takes effect in already-running tasks at their next log line.

use tokio::sync::watch;
use tracing::Span;

/// The logger capability handed to a listener.
pub type Logger = Span;

/// Default logger for a listener called `name`.
pub fn default_logger(name: &str) -> Logger {
    tracing::info_span!("listener", name = %name)
}

/// Owner side: lives on the listener.
#[derive(Debug)]
pub(crate) struct LoggerSlot {
    tx: watch::Sender<Logger>,
}

impl LoggerSlot {
    pub(crate) fn new(logger: Logger) -> Self {
        let (tx, _rx) = watch::channel(logger);
        Self { tx }
    }

    pub(crate) fn set(&self, logger: Logger) {
        self.tx.send_replace(logger);
    }

    pub(crate) fn handle(&self) -> LoggerHandle {
        LoggerHandle {
            rx: self.tx.subscribe(),
        }
    }
}

/// Task side: always resolves to the most recently installed logger.
#[derive(Debug, Clone)]
pub struct LoggerHandle {
    rx: watch::Receiver<Logger>,
}

impl LoggerHandle {
    /// A handle pinned to `logger`, for running sources and processors
    /// outside a [`BaseListener`](crate::lifecycle::BaseListener).
    pub fn fixed(logger: Logger) -> Self {
        let (_tx, rx) = watch::channel(logger);
        Self { rx }
    }

    /// The current logger.
    pub fn current(&self) -> Logger {
        self.rx.borrow().clone()
    }

    /// Run `f` (typically a `tracing` macro) inside the current logger.
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        self.current().in_scope(f)
    }
}
