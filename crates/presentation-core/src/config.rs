//! Presentation configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default engine entrypoint function.
pub const DEFAULT_ENTRYPOINT: &str = "secondaryDisplayMain";

/// Platform category for presentation-capable displays.
pub const PRESENTATION_CATEGORY: &str = "android.hardware.display.category.PRESENTATION";

/// What `show` does with a session that is already active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacePolicy {
    /// Dismiss the old surface before installing the new one.
    #[default]
    DismissPrevious,
    /// Drop the reference only, leaving the old surface on screen.
    KeepPrevious,
}

/// Config load error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Presentation tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    /// Entrypoint executed by newly created engines.
    pub entrypoint: String,
    /// Session replacement behaviour.
    pub replace_policy: ReplacePolicy,
    /// Capacity of the host notification queue.
    pub host_event_capacity: usize,
    /// Category string mapped to presentation-capable displays.
    pub presentation_category: String,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            entrypoint: DEFAULT_ENTRYPOINT.to_string(),
            replace_policy: ReplacePolicy::default(),
            host_event_capacity: 256,
            presentation_category: PRESENTATION_CATEGORY.to_string(),
        }
    }
}

impl PresentationConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns error if the document is not valid JSON for this shape.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)?;
        tracing::debug!(path = %path.display(), ?config, "Loaded presentation config");
        Ok(config)
    }
}
