//! Engine entrypoint selection.

use presentation_core::{EngineLaunch, RouterName, config::DEFAULT_ENTRYPOINT};
use thiserror::Error;

/// Entrypoint build error.
#[derive(Debug, Error)]
pub enum EntrypointError {
    #[error("Entrypoint name is empty")]
    EmptyEntrypoint,
    #[error("Entrypoint name is not an identifier: {0}")]
    InvalidEntrypoint(String),
}

/// Derives an [`EngineLaunch`] from a router name.
#[derive(Debug, Clone)]
pub struct EntrypointBuilder {
    entrypoint: String,
}

impl Default for EntrypointBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ENTRYPOINT)
    }
}

impl EntrypointBuilder {
    /// Use `entrypoint` for every engine.
    #[must_use]
    pub fn new(entrypoint: impl Into<String>) -> Self {
        Self {
            entrypoint: entrypoint.into(),
        }
    }

    /// Build the launch description for `router`.
    ///
    /// The router name becomes the engine's initial route.
    ///
    /// # Errors
    /// Returns error if the entrypoint is empty or not an identifier.
    pub fn build(&self, router: &RouterName) -> Result<EngineLaunch, EntrypointError> {
        let entrypoint = self.entrypoint.trim();
        if entrypoint.is_empty() {
            return Err(EntrypointError::EmptyEntrypoint);
        }
        if !is_identifier(entrypoint) {
            return Err(EntrypointError::InvalidEntrypoint(entrypoint.to_string()));
        }

        Ok(EngineLaunch {
            entrypoint: entrypoint.to_string(),
            initial_route: router.to_string(),
        })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
