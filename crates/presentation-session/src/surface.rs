//! Secondary surface: the presented window plus its method handler.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use presentation_core::{
    BridgeEnvelope, DisplayId, MethodResponse, PresentedWindow, RouterName,
    envelope::methods,
    traits::SurfaceError,
};
use presentation_engine::EngineHandle;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Session identifier.
pub type SessionId = Uuid;

/// Code returned when an acknowledged relay could not be queued.
pub const RELAY_ERROR: &str = "RELAY_ERROR";

/// Public snapshot of an active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Unique session identifier.
    pub id: SessionId,
    /// Router the surface is bound to.
    pub router_name: RouterName,
    /// Display the surface is shown on.
    pub display_id: DisplayId,
}

/// A secondary surface bound to one engine and one display.
pub struct SecondarySurface {
    info: SessionInfo,
    engine: EngineHandle,
    window: Box<dyn PresentedWindow>,
    outbound: mpsc::Sender<BridgeEnvelope>,
}

impl SecondarySurface {
    /// Wrap a presented window.
    ///
    /// `outbound` is the surface's path toward the manager; relayed
    /// messages are emitted there.
    #[must_use]
    pub fn new(
        router_name: RouterName,
        engine: EngineHandle,
        window: Box<dyn PresentedWindow>,
        outbound: mpsc::Sender<BridgeEnvelope>,
    ) -> Self {
        Self {
            info: SessionInfo {
                id: Uuid::new_v4(),
                router_name,
                display_id: window.display_id(),
            },
            engine,
            window,
            outbound,
        }
    }

    /// Session snapshot.
    #[must_use]
    pub const fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// Engine rendering this surface.
    #[must_use]
    pub const fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Handle a method call addressed to the surface.
    pub async fn handle(&self, envelope: BridgeEnvelope) -> MethodResponse {
        match envelope.method.as_str() {
            methods::UPDATE_SECONDARY_DISPLAY => {
                tracing::debug!(session = %self.info.id, "Updating secondary display");
                match self.engine.dispatch(envelope).await {
                    Ok(()) => MethodResponse::success(true.into()),
                    Err(e) => MethodResponse::error(methods::UPDATE_SECONDARY_DISPLAY, e.to_string()),
                }
            }
            methods::SEND_DATA_TO_MAIN => {
                let relayed =
                    BridgeEnvelope::with_data(methods::RECEIVED_DATA_FROM_PRESENTATION, envelope.data());
                tracing::debug!(session = %self.info.id, "Sending data to main");
                match self.outbound.send(relayed).await {
                    Ok(()) => MethodResponse::success(true.into()),
                    Err(_) => MethodResponse::error(RELAY_ERROR, "Relay channel closed"),
                }
            }
            other => {
                tracing::warn!(session = %self.info.id, method = other, "Surface method not implemented");
                MethodResponse::NotImplemented
            }
        }
    }

    /// Remove the surface from its display.
    ///
    /// # Errors
    /// Returns error if the platform fails to dismiss the window.
    pub async fn dismiss(&self) -> Result<(), SurfaceError> {
        self.window.dismiss().await
    }
}

impl fmt::Debug for SecondarySurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondarySurface")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Endpoint error.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Session {0} is no longer active")]
    Closed(SessionId),
}

/// Caller-side handle to a session's surface.
///
/// Valid only while its session is active; calls after `hide` or
/// replacement fail with [`EndpointError::Closed`].
#[derive(Clone)]
pub struct SessionEndpoint {
    surface: Arc<SecondarySurface>,
    live: Arc<AtomicBool>,
}

impl SessionEndpoint {
    pub(crate) fn new(surface: Arc<SecondarySurface>) -> Self {
        Self {
            surface,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Session snapshot.
    #[must_use]
    pub fn info(&self) -> &SessionInfo {
        self.surface.info()
    }

    /// Whether the session is still active.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) fn close(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub(crate) const fn surface(&self) -> &Arc<SecondarySurface> {
        &self.surface
    }

    /// Invoke a method on the surface.
    ///
    /// # Errors
    /// Returns error if the session has ended.
    pub async fn call(&self, envelope: BridgeEnvelope) -> Result<MethodResponse, EndpointError> {
        if !self.is_live() {
            return Err(EndpointError::Closed(self.info().id));
        }
        Ok(self.surface.handle(envelope).await)
    }
}

impl fmt::Debug for SessionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEndpoint")
            .field("info", self.info())
            .field("live", &self.is_live())
            .finish()
    }
}
