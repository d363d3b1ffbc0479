//! The processing task: the sole consumer of the delivery channel.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::channel::DeliveryReceiver;
use crate::listener::HeaderHook;
use crate::logger::LoggerHandle;

/// Counters reported when the processing task exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Hook calls that returned `Ok`.
    pub processed: u64,
    /// Hook calls that returned `Err`.
    pub failed: u64,
    /// Hook calls that panicked.
    pub panicked: u64,
}

impl ProcessorStats {
    /// Headers taken off the channel.
    pub fn received(&self) -> u64 {
        self.processed + self.failed + self.panicked
    }
}

/// Consume headers until `token` fires or the producer goes away.
///
/// The hook is awaited to completion before the next receive, so header N+1 is
/// never taken while header N is still being processed. Cancellation wins over
/// a ready header; anything still in the channel is left there.
pub async fn run_processor(
    mut receiver: DeliveryReceiver,
    hook: Arc<dyn HeaderHook>,
    token: CancellationToken,
    logger: LoggerHandle,
) -> ProcessorStats {
    logger.in_scope(|| tracing::info!("starting header process"));
    let mut stats = ProcessorStats::default();

    loop {
        let header = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            next = receiver.recv() => match next {
                Some(header) => header,
                None => {
                    logger.in_scope(|| tracing::debug!("delivery channel closed"));
                    break;
                }
            },
        };

        let number = header.number;
        // one bad header must not take the listener down
        let call = hook.process_header(&header).instrument(logger.current());
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(())) => {
                stats.processed += 1;
                logger.in_scope(|| {
                    tracing::debug!(number, hash = %header.hash, "header processed")
                });
            }
            Ok(Err(err)) => {
                stats.failed += 1;
                logger.in_scope(|| {
                    tracing::error!(number, error = %err, "header hook failed")
                });
            }
            Err(payload) => {
                stats.panicked += 1;
                let reason = panic_message(payload.as_ref());
                logger.in_scope(|| tracing::error!(number, reason, "header hook panicked"));
            }
        }
    }

    logger.in_scope(|| {
        tracing::info!(
            processed = stats.processed,
            failed = stats.failed,
            panicked = stats.panicked,
            "header process stopped"
        )
    });
    stats
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
