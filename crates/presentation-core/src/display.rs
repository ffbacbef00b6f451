//! Display snapshots, hotplug events and router names.

use std::{fmt, ops::Deref};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform display identifier.
pub type DisplayId = i32;

/// Display rotation.
///
/// Encoded on the wire as the platform's quarter-turn index (`0..=3`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Rotation in degrees.
    #[must_use]
    pub const fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

/// Rotation index outside `0..=3`.
#[derive(Debug, Error)]
#[error("Invalid rotation index: {0}")]
pub struct InvalidRotation(pub u8);

impl TryFrom<u8> for Rotation {
    type Error = InvalidRotation;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Deg0),
            1 => Ok(Self::Deg90),
            2 => Ok(Self::Deg180),
            3 => Ok(Self::Deg270),
            other => Err(InvalidRotation(other)),
        }
    }
}

impl From<Rotation> for u8 {
    fn from(rotation: Rotation) -> Self {
        match rotation {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 1,
            Rotation::Deg180 => 2,
            Rotation::Deg270 => 3,
        }
    }
}

/// Immutable snapshot of a physical display.
///
/// Produced by a [`DisplayProvider`](crate::DisplayProvider); the core only
/// keeps the id and re-resolves the descriptor on every use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayDescriptor {
    /// Platform display id.
    pub display_id: DisplayId,
    /// Platform flag bitset.
    pub flags: u32,
    /// Current rotation.
    pub rotation: Rotation,
    /// Human readable name.
    pub name: String,
}

impl DisplayDescriptor {
    /// Display supports protected buffers.
    pub const FLAG_SUPPORTS_PROTECTED_BUFFERS: u32 = 1 << 0;
    /// Display is secure.
    pub const FLAG_SECURE: u32 = 1 << 1;
    /// Display is private to its owner.
    pub const FLAG_PRIVATE: u32 = 1 << 2;
    /// Display is suitable for presentations.
    pub const FLAG_PRESENTATION: u32 = 1 << 3;

    /// Create a descriptor with no flags and no rotation.
    #[must_use]
    pub fn new(display_id: DisplayId, name: impl Into<String>) -> Self {
        Self {
            display_id,
            flags: 0,
            rotation: Rotation::Deg0,
            name: name.into(),
        }
    }

    /// Set the flag bitset.
    #[must_use]
    pub const fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Set the rotation.
    #[must_use]
    pub const fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Whether the display carries [`Self::FLAG_PRESENTATION`].
    #[must_use]
    pub const fn is_presentation(&self) -> bool {
        self.flags & Self::FLAG_PRESENTATION != 0
    }
}

/// Display hotplug event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayEvent {
    /// A display was attached.
    Attached { display_id: DisplayId },
    /// A display was detached.
    Detached { display_id: DisplayId },
}

impl DisplayEvent {
    /// Signal value sent to hosts: `1` for attach, `0` for detach.
    #[must_use]
    pub const fn signal(self) -> i32 {
        match self {
            Self::Attached { .. } => 1,
            Self::Detached { .. } => 0,
        }
    }

    /// Display the event refers to.
    #[must_use]
    pub const fn display_id(self) -> DisplayId {
        match self {
            Self::Attached { display_id } | Self::Detached { display_id } => display_id,
        }
    }
}

/// Empty router name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Router name must not be empty")]
pub struct EmptyRouterName;

/// Non-empty name selecting a secondary surface route.
///
/// Used as the engine cache key and as the engine's initial route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RouterName(String);

impl RouterName {
    /// Create a router name.
    ///
    /// # Errors
    /// Returns error if the name is empty or whitespace.
    pub fn new(name: impl Into<String>) -> Result<Self, EmptyRouterName> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EmptyRouterName);
        }
        Ok(Self(name))
    }

    /// Borrow as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RouterName {
    type Error = EmptyRouterName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for RouterName {
    type Error = EmptyRouterName;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RouterName> for String {
    fn from(name: RouterName) -> Self {
        name.0
    }
}

impl Deref for RouterName {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_wire_shape() {
        let display = DisplayDescriptor::new(1, "HDMI-1").with_rotation(Rotation::Deg90);
        let json = serde_json::to_value(&display).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"displayId": 1, "flags": 0, "rotation": 1, "name": "HDMI-1"})
        );
    }

    #[test]
    fn test_rotation_rejects_out_of_range() {
        let parsed = serde_json::from_str::<DisplayDescriptor>(
            r#"{"displayId":2,"flags":0,"rotation":7,"name":"x"}"#,
        );
        assert!(parsed.is_err());
        assert_eq!(Rotation::Deg270.degrees(), 270);
    }

    #[test]
    fn test_event_signal() {
        assert_eq!(DisplayEvent::Attached { display_id: 3 }.signal(), 1);
        assert_eq!(DisplayEvent::Detached { display_id: 3 }.signal(), 0);
    }

    #[test]
    fn test_router_name_must_not_be_empty() {
        assert_eq!(RouterName::new("  "), Err(EmptyRouterName));
        let name = RouterName::new("secondary").unwrap();
        assert_eq!(name.as_str(), "secondary");
        assert!(serde_json::from_str::<RouterName>(r#""""#).is_err());
    }
}
