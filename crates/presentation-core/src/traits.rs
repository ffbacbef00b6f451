//! Collaborator traits for displays, engines and presenters.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BridgeEnvelope, DisplayDescriptor, DisplayId, RouterName};

/// Display enumeration error.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("Display service unavailable")]
    Unavailable,
    #[error("Display enumeration failed: {0}")]
    Enumeration(String),
}

/// Trait for platform display enumeration.
#[async_trait]
pub trait DisplayProvider: Send + Sync {
    /// List displays, optionally restricted to a category.
    async fn displays(&self, category: Option<&str>) -> Result<Vec<DisplayDescriptor>, DisplayError>;

    /// Resolve a single display by id.
    async fn display(&self, id: DisplayId) -> Result<Option<DisplayDescriptor>, DisplayError>;
}

/// Callback interface invoked from the platform's notification context.
///
/// Implementations must not block and must not panic.
pub trait DisplayListener: Send + Sync {
    /// A display was added.
    fn on_display_added(&self, id: DisplayId);

    /// A display was removed.
    fn on_display_removed(&self, id: DisplayId);

    /// A display changed its properties.
    fn on_display_changed(&self, _id: DisplayId) {}
}

/// Token identifying a registered listener.
pub type ListenerId = u64;

/// Listener registration error.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Display listener registration failed: {0}")]
    Registration(String),
}

/// Platform hook that dispatches display hotplug callbacks.
pub trait DisplayListenerHost: Send + Sync {
    /// Install a listener.
    ///
    /// # Errors
    /// Returns error if the platform rejects the registration.
    fn register_listener(&self, listener: Arc<dyn DisplayListener>) -> Result<ListenerId, ListenerError>;

    /// Remove a listener. Once this returns the listener is never invoked again.
    fn unregister_listener(&self, id: ListenerId);
}

/// How an engine should be started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLaunch {
    /// Entrypoint function executed by the engine.
    pub entrypoint: String,
    /// Initial route handed to the entrypoint.
    pub initial_route: String,
}

/// Engine error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine init failed: {0}")]
    Init(String),
    #[error("Engine dispatch failed: {0}")]
    Dispatch(String),
}

/// A running rendering-engine instance.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Router name the engine was started for.
    fn router_name(&self) -> &RouterName;

    /// Move the engine into the resumed lifecycle state.
    ///
    /// Called once, right after construction.
    async fn resume(&self);

    /// Deliver a message to code running inside the engine.
    async fn dispatch(&self, envelope: BridgeEnvelope) -> Result<(), EngineError>;

    /// Tear the engine down.
    async fn destroy(&self) {}
}

/// Trait for constructing rendering engines.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Start a new engine for `router`.
    async fn create(
        &self,
        router: &RouterName,
        launch: &EngineLaunch,
    ) -> Result<Arc<dyn RenderEngine>, EngineError>;
}

/// Surface construction or teardown error.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Surface construction failed: {0}")]
    Construction(String),
    #[error("Surface dismissal failed: {0}")]
    Dismiss(String),
}

/// A visible window bound to a display.
#[async_trait]
pub trait PresentedWindow: Send + Sync {
    /// Display the window is shown on.
    fn display_id(&self) -> DisplayId;

    /// Remove the window from its display.
    async fn dismiss(&self) -> Result<(), SurfaceError>;
}

/// Trait for putting an engine's output on a display.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Construct and show a window on `display` rendering `engine`.
    async fn present(
        &self,
        display: &DisplayDescriptor,
        engine: Arc<dyn RenderEngine>,
    ) -> Result<Box<dyn PresentedWindow>, SurfaceError>;
}
