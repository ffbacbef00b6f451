//! Platform context shared by the session manager, registry and watcher.

use std::{fmt, sync::Arc};

use crate::{
    DisplayListenerHost, DisplayProvider, EngineFactory, PresentationConfig, Presenter,
};

/// Explicit handle to every platform collaborator.
///
/// Owned by the process entry point and passed to constructors;
/// nothing in the workspace reaches for a process-wide global.
#[derive(Clone)]
pub struct PlatformContext {
    /// Display enumeration.
    pub displays: Arc<dyn DisplayProvider>,
    /// Display hotplug hook.
    pub listeners: Arc<dyn DisplayListenerHost>,
    /// Window construction on a display.
    pub presenter: Arc<dyn Presenter>,
    /// Engine construction.
    pub engines: Arc<dyn EngineFactory>,
    /// Tunables.
    pub config: PresentationConfig,
}

impl PlatformContext {
    /// Create a context with default configuration.
    #[must_use]
    pub fn new(
        displays: Arc<dyn DisplayProvider>,
        listeners: Arc<dyn DisplayListenerHost>,
        presenter: Arc<dyn Presenter>,
        engines: Arc<dyn EngineFactory>,
    ) -> Self {
        Self {
            displays,
            listeners,
            presenter,
            engines,
            config: PresentationConfig::default(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: PresentationConfig) -> Self {
        self.config = config;
        self
    }
}

impl fmt::Debug for PlatformContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
