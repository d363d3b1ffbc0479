//! The acquisition task: discovers new headers and pushes them into the
//! delivery channel, by polling or by push subscription.
//!
//! Exactly one of [`run_polling`] / [`run_subscription`] runs per listener.
//! Neither closes or drains the channel on exit; dropping the sender is what
//! tells the processing side that no more headers will come.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::channel::DeliverySender;
use crate::client::ChainClient;
use crate::logger::LoggerHandle;
use crate::types::BlockSelector;

/// Why an acquisition task returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionExit {
    /// The acquisition token fired.
    Cancelled,
    /// The subscription could not be set up or reported an error.
    SubscriptionFailed,
    /// The processing side dropped its receiver.
    ChannelClosed,
}

impl std::fmt::Display for AcquisitionExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::SubscriptionFailed => write!(f, "subscription-failed"),
            Self::ChannelClosed => write!(f, "channel-closed"),
        }
    }
}

/// Query the latest header every `interval` and forward it.
///
/// Failed queries and empty answers are logged and dropped; the next tick is
/// the retry. A query already in flight when `token` fires runs to completion,
/// its header is discarded and the task exits.
pub async fn run_polling(
    client: Arc<dyn ChainClient>,
    sender: DeliverySender,
    interval: Duration,
    token: CancellationToken,
    logger: LoggerHandle,
) -> AcquisitionExit {
    logger.in_scope(|| {
        tracing::info!(
            endpoint = client.endpoint(),
            interval_ms = interval.as_millis() as u64,
            "starting polling process"
        )
    });

    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let exit = loop {
        tokio::select! {
            _ = token.cancelled() => break AcquisitionExit::Cancelled,
            _ = ticker.tick() => {
                let header = match client.header_by_number(BlockSelector::Latest).await {
                    Ok(Some(header)) => header,
                    Ok(None) => {
                        logger.in_scope(|| tracing::debug!("no header at latest"));
                        continue;
                    }
                    Err(err) => {
                        logger.in_scope(|| {
                            tracing::warn!(error = %err, "failed to fetch latest header")
                        });
                        continue;
                    }
                };

                let number = header.number;
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break AcquisitionExit::Cancelled,
                    sent = sender.send(header) => {
                        if sent.is_err() {
                            break AcquisitionExit::ChannelClosed;
                        }
                        logger.in_scope(|| tracing::trace!(number, "header delivered"));
                    }
                }
            }
        }
    };

    logger.in_scope(|| tracing::info!(exit = %exit, "polling process stopped"));
    exit
}

/// Let the client push new heads straight into the delivery channel and watch
/// the feed for errors.
///
/// On a subscription error (or a failed subscribe) the acquisition token is
/// cancelled, once, and the task exits. There is no fallback to polling.
pub async fn run_subscription(
    client: Arc<dyn ChainClient>,
    sender: DeliverySender,
    token: CancellationToken,
    logger: LoggerHandle,
) -> AcquisitionExit {
    logger.in_scope(|| {
        tracing::info!(endpoint = client.endpoint(), "starting subscription process")
    });

    let subscribed = tokio::select! {
        biased;
        _ = token.cancelled() => return AcquisitionExit::Cancelled,
        subscribed = client.subscribe_new_head(sender) => subscribed,
    };
    let mut subscription = match subscribed {
        Ok(subscription) => subscription,
        Err(err) => {
            logger.in_scope(|| tracing::error!(error = %err, "failed to subscribe to new heads"));
            token.cancel();
            return AcquisitionExit::SubscriptionFailed;
        }
    };
    logger.in_scope(|| tracing::info!("subscribed to new head"));

    let exit = tokio::select! {
        _ = token.cancelled() => AcquisitionExit::Cancelled,
        err = subscription.err() => {
            logger.in_scope(|| tracing::error!(error = %err, "error while subscribing new blocks"));
            token.cancel();
            AcquisitionExit::SubscriptionFailed
        }
    };
    subscription.unsubscribe();

    logger.in_scope(|| tracing::info!(exit = %exit, "subscription process stopped"));
    exit
}
