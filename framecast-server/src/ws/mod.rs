//! WebSocket module: session orchestration and wire protocol

mod connection;
mod protocol;

pub use connection::ws_handler;
pub use protocol::{ClientMessage, ServerMessage, SourceInfo, TIMEOUT_MESSAGE};
