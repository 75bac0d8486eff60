//! Session admission and inbound queueing

pub mod channel;
pub mod inbox;
pub mod registry;
pub mod types;

// Re-export key types for convenience
pub use channel::{ChannelClosed, MpscChannel, SessionChannel};
pub use inbox::Backpressure;
pub use registry::{RegistryConfig, SessionRegistry};
pub use types::{ChannelMessage, SessionId};
