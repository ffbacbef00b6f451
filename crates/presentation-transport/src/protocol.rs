//! Wire protocol for host-bridge communication.

use presentation_core::{BridgeEnvelope, Channel, DisplayEvent, MethodResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol error.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Request identifier chosen by the client.
pub type CallId = u64;

/// Message from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Method call on a bridge channel; answered by exactly one `Response`.
    Call {
        id: CallId,
        channel: Channel,
        method: String,
        #[serde(default)]
        payload: Value,
    },
    /// Start receiving display events.
    Subscribe,
    /// Stop receiving display events.
    Unsubscribe,
    /// Ping for keepalive.
    Ping,
}

impl ClientFrame {
    /// Parse a frame from JSON text.
    ///
    /// # Errors
    /// Returns error if the text is not a valid frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build a call frame.
    #[must_use]
    pub fn call(id: CallId, channel: Channel, envelope: BridgeEnvelope) -> Self {
        Self::Call {
            id,
            channel,
            method: envelope.method,
            payload: envelope.payload,
        }
    }
}

/// Message from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Result of a `Call`.
    Response { id: CallId, result: MethodResponse },
    /// Fire-and-forget notification to the host.
    Notification { method: String, payload: Value },
    /// Display hotplug signal: `1` attach, `0` detach.
    DisplayEvent { value: i32 },
    /// Error not tied to a call.
    Error { message: String },
    /// Pong response.
    Pong,
}

impl ServerFrame {
    /// Frame for a host notification.
    #[must_use]
    pub fn notification(envelope: BridgeEnvelope) -> Self {
        Self::Notification {
            method: envelope.method,
            payload: envelope.payload,
        }
    }

    /// Frame for a display event.
    #[must_use]
    pub const fn display_event(event: DisplayEvent) -> Self {
        Self::DisplayEvent {
            value: event.signal(),
        }
    }

    /// Serialize to JSON text.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
