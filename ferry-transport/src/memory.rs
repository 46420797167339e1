use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use ferry_core::Message;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::transport::{Transport, TransportError};

/// One end of an in-process channel pair.
#[derive(Debug)]
pub struct MemoryTransport {
    tx: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    rx: AsyncMutex<mpsc::UnboundedReceiver<Message>>,
    shutdown: CancellationToken,
}

impl MemoryTransport {
    /// Two connected ends: what one pushes, the other pops.
    pub fn pair() -> (MemoryTransport, MemoryTransport) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::from_channels(a_tx, a_rx), Self::from_channels(b_tx, b_rx))
    }

    /// Build an end from a caller-supplied outgoing sender and incoming receiver.
    pub fn from_channels(
        tx: mpsc::UnboundedSender<Message>,
        rx: mpsc::UnboundedReceiver<Message>,
    ) -> Self {
        MemoryTransport {
            tx: Mutex::new(Some(tx)),
            rx: AsyncMutex::new(rx),
            shutdown: CancellationToken::new(),
        }
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<Message>> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn push(&self, msg: Message) -> Result<(), TransportError> {
        let tx = self.sender().ok_or(TransportError::ConnectionClosed)?;
        trace!("memory push: {}", msg.tag());
        tx.send(msg).map_err(|_| TransportError::ConnectionClosed)
    }

    async fn pop(&self) -> Result<Option<Message>, TransportError> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            _ = self.shutdown.cancelled() => Ok(None),
            msg = rx.recv() => Ok(msg),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.shutdown.cancel();
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}
