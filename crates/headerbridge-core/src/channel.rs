//! The delivery channel: an ordered, unbuffered handoff from the acquisition
//! task to the processing task.
//!
//! Tokio's mpsc has no zero-capacity mode, so each header travels with a
//! oneshot acknowledgement and [`DeliverySender::send`] only returns once the
//! receiver has taken it. The producer can therefore never run more than one
//! header ahead of the consumer.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::types::Header;

type Envelope = (Header, oneshot::Sender<()>);

/// The receiving side went away before taking the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("delivery channel closed")]
pub struct DeliveryClosed;

/// Producer half. Deliberately not `Clone`: one producer per listener.
#[derive(Debug)]
pub struct DeliverySender {
    tx: mpsc::Sender<Envelope>,
}

/// Consumer half.
#[derive(Debug)]
pub struct DeliveryReceiver {
    rx: mpsc::Receiver<Envelope>,
}

/// Create a connected sender/receiver pair.
pub fn delivery_channel() -> (DeliverySender, DeliveryReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (DeliverySender { tx }, DeliveryReceiver { rx })
}

impl DeliverySender {
    /// Hand `header` to the consumer, waiting until it has been received.
    ///
    /// Dropping this future mid-way is fine: a header already handed over
    /// stays in the conduit and is delivered at most once.
    pub async fn send(&self, header: Header) -> Result<(), DeliveryClosed> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send((header, ack_tx))
            .await
            .map_err(|_| DeliveryClosed)?;
        ack_rx.await.map_err(|_| DeliveryClosed)
    }

    /// Returns `true` once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl DeliveryReceiver {
    /// Wait for the next header. `None` once the sender is gone and the
    /// conduit is empty. Cancel-safe.
    pub async fn recv(&mut self) -> Option<Header> {
        let (header, ack) = self.rx.recv().await?;
        let _ = ack.send(());
        Some(header)
    }
}
