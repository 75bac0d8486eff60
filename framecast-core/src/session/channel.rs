//! Outbound transport channel abstraction
//!
//! The registry only needs to push messages to a peer and to close the
//! connection. The transport (WebSocket, test harness, ...) implements
//! [`SessionChannel`].

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

use super::types::ChannelMessage;

/// The peer side of a channel has gone away
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("channel closed")]
pub struct ChannelClosed;

/// Outbound half of a session's duplex transport
#[async_trait]
pub trait SessionChannel: Send + Sync {
    /// Send a message to the peer
    async fn send(&self, message: ChannelMessage) -> Result<(), ChannelClosed>;

    /// Close the channel; later sends fail with [`ChannelClosed`]
    async fn close(&self);
}

/// Channel backed by a bounded tokio mpsc queue
///
/// The receiving half is drained by a writer task that owns the real socket.
/// Closing drops the sender so the writer task observes end-of-stream.
pub struct MpscChannel {
    tx: Mutex<Option<mpsc::Sender<ChannelMessage>>>,
}

impl MpscChannel {
    /// Create a channel and the receiver its writer task should drain
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ChannelMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

#[async_trait]
impl SessionChannel for MpscChannel {
    async fn send(&self, message: ChannelMessage) -> Result<(), ChannelClosed> {
        // Clone out so a slow send does not hold the lock against close()
        let tx = self.tx.lock().await.clone();
        match tx {
            Some(tx) => tx.send(message).await.map_err(|_| ChannelClosed),
            None => Err(ChannelClosed),
        }
    }

    async fn close(&self) {
        self.tx.lock().await.take();
    }
}
