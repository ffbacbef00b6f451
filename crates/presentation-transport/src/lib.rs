//! Message bridge and transports for secondary display presentations.
//!
//! Provides:
//! - `MessageBridge` - Three-channel routing with a directed relay table
//! - Wire protocol (JSON frames)
//! - WebSocket transport (feature: websocket)

pub mod bridge;
pub mod protocol;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use bridge::{HostReceiver, MessageBridge, RelayTable, Route};
pub use protocol::{ClientFrame, ServerFrame};
