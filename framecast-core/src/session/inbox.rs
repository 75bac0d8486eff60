//! Bounded per-session inbound queues
//!
//! Each admitted session gets an [`Inbox`]: one queue of decoded JSON
//! messages and one queue of raw binary payloads. Capacity is fixed at
//! admission; what happens when a queue is full is decided by [`Backpressure`].

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::Instant;

/// Policy applied when a message arrives for a full queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum Backpressure {
    /// Evict the oldest queued message to make room for the new one
    #[default]
    DropOldest,
    /// Wait for space, then drop the new message once `timeout` expires
    Block {
        #[serde(with = "millis")]
        timeout: Duration,
    },
}

/// Result of pushing into a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest entry
    Evicted,
    /// Queue stayed full for the whole block timeout; the new entry was dropped
    Dropped,
    /// Queue was closed; the entry was discarded
    Closed,
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
    dropped: u64,
}

/// FIFO queue with a fixed capacity (0 = unbounded) and async wakeups
pub(crate) struct BoundedQueue<T> {
    capacity: usize,
    policy: Backpressure,
    state: Mutex<QueueState<T>>,
    readable: Notify,
    writable: Notify,
}

impl<T> BoundedQueue<T> {
    pub(crate) fn new(capacity: usize, policy: Backpressure) -> Self {
        Self {
            capacity,
            policy,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
                dropped: 0,
            }),
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn has_room(&self, state: &QueueState<T>) -> bool {
        self.capacity == 0 || state.items.len() < self.capacity
    }

    pub(crate) async fn push(&self, item: T) -> PushOutcome {
        let deadline = match self.policy {
            Backpressure::Block { timeout } => Some(Instant::now() + timeout),
            Backpressure::DropOldest => None,
        };

        loop {
            let writable = self.writable.notified();
            {
                let mut state = self.lock();
                if state.closed {
                    return PushOutcome::Closed;
                }
                if self.has_room(&state) {
                    state.items.push_back(item);
                    drop(state);
                    self.readable.notify_one();
                    return PushOutcome::Queued;
                }
                if deadline.is_none() {
                    state.items.pop_front();
                    state.items.push_back(item);
                    state.dropped += 1;
                    drop(state);
                    self.readable.notify_one();
                    return PushOutcome::Evicted;
                }
            }

            if let Some(deadline) = deadline
                && tokio::time::timeout_at(deadline, writable).await.is_err()
            {
                self.lock().dropped += 1;
                return PushOutcome::Dropped;
            }
        }
    }

    /// Wait for the next item in FIFO order; `None` once the queue is closed
    pub(crate) async fn pop(&self) -> Option<T> {
        loop {
            let readable = self.readable.notified();
            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    drop(state);
                    self.writable.notify_one();
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            readable.await;
        }
    }

    /// Take the newest item and discard everything older, under one lock
    pub(crate) fn pop_latest(&self) -> Option<T> {
        let mut state = self.lock();
        let latest = state.items.pop_back();
        state.items.clear();
        drop(state);
        if latest.is_some() {
            self.writable.notify_waiters();
        }
        latest
    }

    pub(crate) fn close(&self) {
        {
            let mut state = self.lock();
            state.closed = true;
            state.items.clear();
        }
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}

/// The pair of inbound queues owned by one session
pub(crate) struct Inbox {
    pub(crate) messages: BoundedQueue<serde_json::Value>,
    pub(crate) bytes: BoundedQueue<Vec<u8>>,
}

impl Inbox {
    pub(crate) fn new(capacity: usize, policy: Backpressure) -> Self {
        Self {
            messages: BoundedQueue::new(capacity, policy),
            bytes: BoundedQueue::new(capacity, policy),
        }
    }

    pub(crate) fn close(&self) {
        self.messages.close();
        self.bytes.close();
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.messages.dropped() + self.bytes.dropped()
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
