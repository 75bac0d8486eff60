//! SessionRegistry for admitting and tracking connected sessions
//!
//! The registry enforces the global concurrency cap at admission time and
//! owns every session's outbound channel and inbound queues. The whole table
//! sits behind one lock because the cap and the count need whole-table
//! visibility; each session's queues have their own synchronization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::RegistryError;

use super::channel::SessionChannel;
use super::inbox::{Backpressure, Inbox, PushOutcome};
use super::types::{ChannelMessage, SessionId};

/// Registry-wide settings fixed at construction
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    /// Maximum number of concurrently admitted sessions (0 = unlimited)
    pub max_sessions: usize,
    /// Upper bound on a single outbound send
    pub send_timeout: Duration,
    /// What to do when a session's inbound queue is full
    pub backpressure: Backpressure,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_sessions: 0,
            send_timeout: Duration::from_secs(5),
            backpressure: Backpressure::default(),
        }
    }
}

impl RegistryConfig {
    /// Create a config with the given session cap and default timeouts
    pub fn with_max_sessions(max_sessions: usize) -> Self {
        Self {
            max_sessions,
            ..Self::default()
        }
    }
}

/// An admitted session
struct SessionEntry {
    channel: Arc<dyn SessionChannel>,
    inbox: Inbox,
    last_activity: Mutex<Instant>,
}

impl SessionEntry {
    fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn last_activity(&self) -> Instant {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tracks admitted sessions and their queues
///
/// SessionRegistry provides:
/// - Admission control against a global session cap
/// - Per-session bounded inbound queues with a backpressure policy
/// - FIFO and latest-only receive paths
/// - Idempotent teardown that wakes pending receivers
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<SessionEntry>>>,
    config: RegistryConfig,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    async fn entry(&self, id: SessionId) -> Result<Arc<SessionEntry>, RegistryError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RegistryError::SessionNotFound(id))
    }

    /// Admit a session
    ///
    /// Fails with [`RegistryError::ServerFull`] when the cap is reached, leaving
    /// the registry untouched. `max_queue_size` bounds this session's inbound
    /// queues (0 = unbounded).
    pub async fn connect(
        &self,
        id: SessionId,
        channel: Arc<dyn SessionChannel>,
        max_queue_size: usize,
    ) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(&id) {
            return Err(RegistryError::AlreadyConnected(id));
        }

        let limit = self.config.max_sessions;
        if limit > 0 && sessions.len() >= limit {
            warn!(session_id = %id, current = sessions.len(), limit, "Admission rejected");
            return Err(RegistryError::ServerFull {
                current: sessions.len(),
                limit,
            });
        }

        let entry = SessionEntry {
            channel,
            inbox: Inbox::new(max_queue_size, self.config.backpressure),
            last_activity: Mutex::new(Instant::now()),
        };
        sessions.insert(id, Arc::new(entry));

        info!(session_id = %id, users = sessions.len(), "Session admitted");
        Ok(())
    }

    /// Remove a session, closing its queues and channel
    ///
    /// Idempotent: returns `false` when the session was already gone.
    pub async fn disconnect(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id);

        match removed {
            Some(entry) => {
                entry.inbox.close();
                entry.channel.close().await;
                info!(session_id = %id, "Session disconnected");
                true
            }
            None => {
                debug!(session_id = %id, "Disconnect for unknown session ignored");
                false
            }
        }
    }

    /// Send a message to a session
    ///
    /// Closed channels and sends exceeding the configured timeout are logged
    /// and reported; neither blocks the caller past `send_timeout`.
    pub async fn send(&self, id: SessionId, message: ChannelMessage) -> Result<(), RegistryError> {
        let entry = self.entry(id).await?;

        match tokio::time::timeout(self.config.send_timeout, entry.channel.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => {
                warn!(session_id = %id, "Send failed: channel closed");
                Err(RegistryError::ChannelClosed(id))
            }
            Err(_) => {
                warn!(session_id = %id, timeout = ?self.config.send_timeout, "Send timed out");
                Err(RegistryError::SendTimeout(id))
            }
        }
    }

    /// Serialize and send a JSON message to a session
    pub async fn send_json<T: Serialize>(&self, id: SessionId, value: &T) -> Result<(), RegistryError> {
        match ChannelMessage::json(value) {
            Ok(message) => self.send(id, message).await,
            Err(e) => {
                // Our own message types always serialize; treat failure as a dead peer
                warn!(session_id = %id, error = %e, "Failed to encode outbound message");
                Err(RegistryError::ChannelClosed(id))
            }
        }
    }

    /// Enqueue a decoded inbound message for a session
    pub async fn deliver(&self, id: SessionId, message: serde_json::Value) -> Result<(), RegistryError> {
        let entry = self.entry(id).await?;
        entry.touch();
        let outcome = entry.inbox.messages.push(message).await;
        Self::report_push(id, outcome)
    }

    /// Enqueue a raw binary payload for a session
    pub async fn deliver_bytes(&self, id: SessionId, bytes: Vec<u8>) -> Result<(), RegistryError> {
        let entry = self.entry(id).await?;
        entry.touch();
        let outcome = entry.inbox.bytes.push(bytes).await;
        Self::report_push(id, outcome)
    }

    fn report_push(id: SessionId, outcome: PushOutcome) -> Result<(), RegistryError> {
        match outcome {
            PushOutcome::Queued => Ok(()),
            PushOutcome::Evicted => {
                debug!(session_id = %id, "Inbound queue full, evicted oldest message");
                Ok(())
            }
            PushOutcome::Dropped => {
                warn!(session_id = %id, "Inbound queue full, dropped message");
                Ok(())
            }
            PushOutcome::Closed => Err(RegistryError::ChannelClosed(id)),
        }
    }

    /// Wait for the next message for a session (FIFO)
    ///
    /// Returns [`RegistryError::ChannelClosed`] once the session is torn down.
    pub async fn receive(&self, id: SessionId) -> Result<serde_json::Value, RegistryError> {
        let entry = self.entry(id).await?;
        entry
            .inbox
            .messages
            .pop()
            .await
            .ok_or(RegistryError::ChannelClosed(id))
    }

    /// Wait for the next binary payload for a session
    pub async fn receive_bytes(&self, id: SessionId) -> Result<Vec<u8>, RegistryError> {
        let entry = self.entry(id).await?;
        entry
            .inbox
            .bytes
            .pop()
            .await
            .ok_or(RegistryError::ChannelClosed(id))
    }

    /// Take the freshest pending message, discarding any older ones
    ///
    /// Never blocks; `Ok(None)` when nothing is pending.
    pub async fn receive_latest(
        &self,
        id: SessionId,
    ) -> Result<Option<serde_json::Value>, RegistryError> {
        let entry = self.entry(id).await?;
        Ok(entry.inbox.messages.pop_latest())
    }

    /// Number of currently admitted sessions
    pub async fn user_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether a session is currently admitted
    pub async fn check(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// When the session last delivered anything
    pub async fn last_activity(&self, id: SessionId) -> Result<Instant, RegistryError> {
        Ok(self.entry(id).await?.last_activity())
    }

    /// Mark a session as active without delivering a message
    pub async fn touch(&self, id: SessionId) -> Result<(), RegistryError> {
        self.entry(id).await?.touch();
        Ok(())
    }

    /// Messages dropped or evicted by backpressure for a session
    pub async fn dropped(&self, id: SessionId) -> Result<u64, RegistryError> {
        Ok(self.entry(id).await?.inbox.dropped())
    }

    /// IDs of all admitted sessions
    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().copied().collect()
    }
}
