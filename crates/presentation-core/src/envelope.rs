//! Method-call envelopes and structured results.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Method names understood on the bridge channels.
pub mod methods {
    /// Control: enumerate displays.
    pub const LIST_DISPLAYS: &str = "listDisplays";
    /// Control: legacy spelling of [`LIST_DISPLAYS`].
    pub const LIST_DISPLAY: &str = "listDisplay";
    /// Control: show a secondary surface.
    pub const SHOW_PRESENTATION: &str = "showPresentation";
    /// Control: hide the secondary surface.
    pub const HIDE_PRESENTATION: &str = "hidePresentation";
    /// ToSecondary: push data to the secondary surface.
    pub const UPDATE_SECONDARY_DISPLAY: &str = "updateSecondaryDisplay";
    /// ToSecondary: host push path, relayed as [`UPDATE_SECONDARY_DISPLAY`].
    pub const RECEIVED_DATA_FROM_MAIN: &str = "receivedDataFromMain";
    /// FromSecondary: secondary surface sends data toward the host.
    pub const SEND_DATA_TO_MAIN: &str = "sendDataToMain";
    /// Host notification carrying data from the secondary surface.
    pub const RECEIVED_DATA_FROM_PRESENTATION: &str = "receivedDataFromPresentation";
}

/// Logical bridge channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Host commands for the session manager.
    Control,
    /// Manager toward the secondary surface.
    ToSecondary,
    /// Secondary surface toward the manager.
    FromSecondary,
    /// Notifications delivered to the host.
    Host,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Control => "control",
            Self::ToSecondary => "to_secondary",
            Self::FromSecondary => "from_secondary",
            Self::Host => "host",
        };
        f.write_str(name)
    }
}

/// A method name plus opaque payload, carried uniformly on every channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeEnvelope {
    /// Method name.
    pub method: String,
    /// Arguments, usually a JSON object.
    #[serde(default)]
    pub payload: Value,
}

impl BridgeEnvelope {
    /// Create an envelope.
    #[must_use]
    pub fn new(method: impl Into<String>, payload: Value) -> Self {
        Self {
            method: method.into(),
            payload,
        }
    }

    /// Envelope whose payload is `{"data": data}`.
    #[must_use]
    pub fn with_data(method: impl Into<String>, data: Value) -> Self {
        Self::new(method, serde_json::json!({ "data": data }))
    }

    /// Look up a named argument in an object payload.
    ///
    /// Missing keys and explicit `null` both yield `None`.
    #[must_use]
    pub fn argument(&self, key: &str) -> Option<&Value> {
        self.payload.get(key).filter(|v| !v.is_null())
    }

    /// The `data` argument, or `null` when absent.
    #[must_use]
    pub fn data(&self) -> Value {
        self.argument("data").cloned().unwrap_or(Value::Null)
    }
}

/// Structured error returned across a command boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {}", .message.as_deref().unwrap_or("<no message>"))]
pub struct MethodError {
    /// Error code.
    pub code: String,
    /// Human readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Extra machine readable details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl MethodError {
    /// Create an error with a code and message.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: Some(message.into()),
            details: None,
        }
    }
}

/// Outcome of a single method call.
///
/// Every call yields exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    /// Call succeeded.
    Success { value: Value },
    /// Call failed.
    Error(MethodError),
    /// No handler for the method on that channel.
    NotImplemented,
}

impl MethodResponse {
    /// Successful response.
    #[must_use]
    pub const fn success(value: Value) -> Self {
        Self::Success { value }
    }

    /// Error response.
    #[must_use]
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error(MethodError::new(code, message))
    }

    /// Whether the call succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Success value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Success { value } => Some(value),
            _ => None,
        }
    }
}

impl From<MethodError> for MethodResponse {
    fn from(err: MethodError) -> Self {
        Self::Error(err)
    }
}
