//! Session manager for the single secondary presentation.

use std::sync::Arc;

use presentation_core::{
    BridgeEnvelope, DisplayDescriptor, DisplayId, MethodError, MethodResponse, PlatformContext,
    ReplacePolicy, RouterName,
    envelope::methods,
    traits::{DisplayError, SurfaceError},
};
use presentation_engine::{EngineRegistry, RegistryError};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};

use crate::surface::{SecondarySurface, SessionEndpoint, SessionInfo};

/// Code for a missing or malformed command argument.
pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
/// Code for a failed display enumeration.
pub const LIST_DISPLAY_ERROR: &str = "LIST_DISPLAY_ERROR";
/// Code for a missing display or engine.
pub const NOT_FOUND: &str = "404";
/// Message for a missing engine, kept for host compatibility.
pub const ENGINE_NOT_FOUND_MESSAGE: &str = "Can't find FlutterEngine";

/// Session manager error.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Missing or invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("Can't find display with displayId {0}")]
    DisplayNotFound(DisplayId),
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(#[from] RegistryError),
    #[error("Display error: {0}")]
    Display(#[from] DisplayError),
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ManagerError {
    /// Convert into the structured error returned for `method`.
    #[must_use]
    pub fn to_method_error(&self, method: &str) -> MethodError {
        match self {
            Self::InvalidArgument(_) => MethodError::new(INVALID_ARGUMENT, self.to_string()),
            Self::DisplayNotFound(_) => MethodError::new(NOT_FOUND, self.to_string()),
            Self::EngineUnavailable(e) => MethodError {
                code: NOT_FOUND.to_string(),
                message: Some(ENGINE_NOT_FOUND_MESSAGE.to_string()),
                details: Some(Value::String(e.to_string())),
            },
            Self::Display(_) | Self::Json(_) if is_list_method(method) => {
                MethodError::new(LIST_DISPLAY_ERROR, format!("Failed to list displays: {self}"))
            }
            Self::Display(_) | Self::Json(_) | Self::Surface(_) => {
                MethodError::new(method, self.to_string())
            }
        }
    }
}

fn is_list_method(method: &str) -> bool {
    method == methods::LIST_DISPLAYS || method == methods::LIST_DISPLAY
}

/// Orchestrates display lookup, engine acquisition and the active surface.
///
/// At most one session is active. `show` and `hide` are serialized on an
/// internal lock, so callers may issue them from any task.
pub struct SessionManager {
    ctx: PlatformContext,
    engines: Arc<EngineRegistry>,
    outbound: mpsc::Sender<BridgeEnvelope>,
    active: Mutex<Option<SessionEndpoint>>,
}

impl SessionManager {
    /// Create a new session manager.
    ///
    /// `outbound` receives every message a surface relays toward the host.
    #[must_use]
    pub fn new(
        ctx: PlatformContext,
        engines: Arc<EngineRegistry>,
        outbound: mpsc::Sender<BridgeEnvelope>,
    ) -> Self {
        Self {
            ctx,
            engines,
            outbound,
            active: Mutex::new(None),
        }
    }

    /// Engine registry shared with this manager.
    #[must_use]
    pub const fn engines(&self) -> &Arc<EngineRegistry> {
        &self.engines
    }

    /// Platform context.
    #[must_use]
    pub const fn context(&self) -> &PlatformContext {
        &self.ctx
    }

    /// Handle a Control-channel command.
    ///
    /// Never fails: every error is converted into a structured response.
    pub async fn handle_command(&self, envelope: &BridgeEnvelope) -> MethodResponse {
        let method = envelope.method.as_str();
        let result = match method {
            methods::LIST_DISPLAYS | methods::LIST_DISPLAY => self.list_displays_json(envelope).await,
            methods::SHOW_PRESENTATION => match parse_show_args(envelope) {
                Ok((display_id, router)) => self.show(display_id, router).await.map(|_| true.into()),
                Err(e) => Err(e),
            },
            methods::HIDE_PRESENTATION => self.hide().await.map(|_| true.into()),
            other => {
                tracing::warn!(method = other, "Control method not implemented");
                return MethodResponse::NotImplemented;
            }
        };

        match result {
            Ok(value) => MethodResponse::success(value),
            Err(e) => {
                tracing::warn!(method, "Control command failed: {e}");
                MethodResponse::Error(e.to_method_error(method))
            }
        }
    }

    async fn list_displays_json(&self, envelope: &BridgeEnvelope) -> Result<Value, ManagerError> {
        let category = envelope.argument("category").and_then(Value::as_str);
        let displays = self.list_displays(category).await?;
        Ok(Value::String(serde_json::to_string(&displays)?))
    }

    /// Enumerate displays, optionally filtered by category.
    ///
    /// # Errors
    /// Returns error if enumeration fails; no partial list is returned.
    pub async fn list_displays(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<DisplayDescriptor>, ManagerError> {
        let displays = self.ctx.displays.displays(category).await?;
        tracing::debug!(?category, count = displays.len(), "Listed displays");
        Ok(displays)
    }

    /// Show `router` on `display_id`, replacing any active session.
    ///
    /// On error the previous state is left untouched.
    ///
    /// # Errors
    /// Returns error if the display is absent, the engine cannot be
    /// constructed, or the window cannot be presented.
    pub async fn show(
        &self,
        display_id: DisplayId,
        router: RouterName,
    ) -> Result<SessionInfo, ManagerError> {
        let mut active = self.active.lock().await;

        let display = self
            .ctx
            .displays
            .display(display_id)
            .await?
            .ok_or(ManagerError::DisplayNotFound(display_id))?;

        let engine = self.engines.acquire(&router).await?;
        let window = self.ctx.presenter.present(&display, engine.engine()).await?;

        let surface = Arc::new(SecondarySurface::new(
            router,
            engine,
            window,
            self.outbound.clone(),
        ));
        let endpoint = SessionEndpoint::new(surface);
        let info = endpoint.info().clone();

        if let Some(previous) = active.replace(endpoint) {
            previous.close();
            match self.ctx.config.replace_policy {
                ReplacePolicy::DismissPrevious => {
                    if let Err(e) = previous.surface().dismiss().await {
                        tracing::warn!(session = %previous.info().id, "Failed to dismiss replaced surface: {e}");
                    }
                }
                ReplacePolicy::KeepPrevious => {
                    tracing::debug!(session = %previous.info().id, "Leaving replaced surface on screen");
                }
            }
        }

        tracing::info!(
            session = %info.id,
            router = %info.router_name,
            display_id = info.display_id,
            "Presentation shown"
        );
        Ok(info)
    }

    /// Hide the active session, if any.
    ///
    /// Returns whether a session was active. Calling with no session is a no-op.
    ///
    /// # Errors
    /// Returns error if the window fails to dismiss. The session is
    /// cleared regardless.
    pub async fn hide(&self) -> Result<bool, ManagerError> {
        let Some(endpoint) = self.active.lock().await.take() else {
            tracing::debug!("Hide requested with no active presentation");
            return Ok(false);
        };

        endpoint.close();
        tracing::info!(session = %endpoint.info().id, "Presentation hidden");
        endpoint.surface().dismiss().await?;
        Ok(true)
    }

    /// Endpoint of the active session.
    pub async fn active_endpoint(&self) -> Option<SessionEndpoint> {
        self.active.lock().await.clone()
    }

    /// Snapshot of the active session.
    pub async fn active_session(&self) -> Option<SessionInfo> {
        self.active.lock().await.as_ref().map(|e| e.info().clone())
    }
}

fn parse_show_args(envelope: &BridgeEnvelope) -> Result<(DisplayId, RouterName), ManagerError> {
    let display_id = envelope
        .argument("displayId")
        .ok_or(ManagerError::InvalidArgument("displayId"))?
        .as_i64()
        .and_then(|id| DisplayId::try_from(id).ok())
        .ok_or(ManagerError::InvalidArgument("displayId"))?;

    let router = envelope
        .argument("routerName")
        .and_then(Value::as_str)
        .ok_or(ManagerError::InvalidArgument("routerName"))?;
    let router = RouterName::new(router).map_err(|_| ManagerError::InvalidArgument("routerName"))?;

    Ok((display_id, router))
}

#[cfg(test)]
mod tests {
    use presentation_core::{PresentationConfig, Rotation};
    use presentation_engine::MemoryEngineFactory;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::platform::MemoryPlatform;

    struct Fixture {
        platform: Arc<MemoryPlatform>,
        factory: Arc<MemoryEngineFactory>,
        manager: SessionManager,
        outbound_rx: mpsc::Receiver<BridgeEnvelope>,
    }

    fn fixture_with(config: PresentationConfig) -> Fixture {
        let platform = Arc::new(MemoryPlatform::new());
        platform.attach(DisplayDescriptor::new(0, "Built-in"));
        platform.attach(
            DisplayDescriptor::new(1, "HDMI-1").with_flags(DisplayDescriptor::FLAG_PRESENTATION),
        );
        let factory = Arc::new(MemoryEngineFactory::new());
        let ctx = platform.context(factory.clone()).with_config(config);
        let engines = Arc::new(EngineRegistry::new(factory.clone()));
        let (tx, outbound_rx) = mpsc::channel(16);
        Fixture {
            platform,
            factory,
            manager: SessionManager::new(ctx, engines, tx),
            outbound_rx,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(PresentationConfig::default())
    }

    fn router(name: &str) -> RouterName {
        RouterName::new(name).unwrap()
    }

    fn show_call(display_id: Value, router: Value) -> BridgeEnvelope {
        BridgeEnvelope::new(
            methods::SHOW_PRESENTATION,
            json!({"displayId": display_id, "routerName": router}),
        )
    }

    #[tokio::test]
    async fn test_list_displays_returns_json_array() {
        let f = fixture();
        f.platform.detach(0);

        let resp = f
            .manager
            .handle_command(&BridgeEnvelope::new(methods::LIST_DISPLAYS, Value::Null))
            .await;
        let encoded = resp.value().and_then(Value::as_str).unwrap();
        let decoded: Value = serde_json::from_str(encoded).unwrap();
        assert_eq!(
            decoded,
            json!([{"displayId": 1, "flags": 8, "rotation": 0, "name": "HDMI-1"}])
        );
    }

    #[tokio::test]
    async fn test_list_displays_by_category() {
        let f = fixture();
        f.platform.attach(
            DisplayDescriptor::new(2, "Rotated")
                .with_flags(DisplayDescriptor::FLAG_PRESENTATION)
                .with_rotation(Rotation::Deg180),
        );

        let all = assert_ok!(f.manager.list_displays(None).await);
        assert_eq!(all.len(), 3);

        let category = f.manager.context().config.presentation_category.clone();
        let presentation = assert_ok!(f.manager.list_displays(Some(&category)).await);
        let ids: Vec<_> = presentation.iter().map(|d| d.display_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_list_displays_failure_is_structured() {
        let f = fixture();
        f.platform.set_enumeration_failure(true);

        let resp = f
            .manager
            .handle_command(&BridgeEnvelope::new(methods::LIST_DISPLAY, Value::Null))
            .await;
        let MethodResponse::Error(err) = resp else {
            panic!("expected error, got {resp:?}");
        };
        assert_eq!(err.code, LIST_DISPLAY_ERROR);
        assert!(err.message.unwrap().starts_with("Failed to list displays"));
    }

    #[tokio::test]
    async fn test_show_then_hide() {
        let f = fixture();

        let info = assert_ok!(f.manager.show(1, router("secondary")).await);
        assert_eq!(info.display_id, 1);
        assert_eq!(f.platform.visible_windows(), vec![1]);
        assert_eq!(f.manager.active_session().await, Some(info));

        assert!(assert_ok!(f.manager.hide().await));
        assert!(f.platform.visible_windows().is_empty());
        assert!(f.manager.active_session().await.is_none());
    }

    #[tokio::test]
    async fn test_hide_is_idempotent() {
        let f = fixture();
        for _ in 0..2 {
            let resp = f
                .manager
                .handle_command(&BridgeEnvelope::new(methods::HIDE_PRESENTATION, Value::Null))
                .await;
            assert_eq!(resp, MethodResponse::success(json!(true)));
        }
    }

    #[tokio::test]
    async fn test_show_missing_display_leaves_state() {
        let f = fixture();

        let resp = f.manager.handle_command(&show_call(json!(99), json!("secondary"))).await;
        let MethodResponse::Error(err) = resp else {
            panic!("expected error, got {resp:?}");
        };
        assert_eq!(err.code, NOT_FOUND);
        assert_eq!(err.message.as_deref(), Some("Can't find display with displayId 99"));
        assert!(f.manager.active_session().await.is_none());
        assert_eq!(f.factory.created(), 0);

        let info = assert_ok!(f.manager.show(1, router("secondary")).await);
        assert_err!(f.manager.show(99, router("other")).await);
        assert_eq!(f.manager.active_session().await, Some(info));
    }

    #[tokio::test]
    async fn test_show_validates_arguments() {
        let f = fixture();

        for call in [
            show_call(Value::Null, json!("secondary")),
            show_call(json!(1), Value::Null),
            show_call(json!("one"), json!("secondary")),
            show_call(json!(1), json!("")),
        ] {
            let resp = f.manager.handle_command(&call).await;
            let MethodResponse::Error(err) = resp else {
                panic!("expected error, got {resp:?}");
            };
            assert_eq!(err.code, INVALID_ARGUMENT);
        }
        assert!(f.manager.active_session().await.is_none());
    }

    #[tokio::test]
    async fn test_engine_failure_maps_to_not_found() {
        let f = fixture();
        f.factory.fail_router("broken");

        let resp = f.manager.handle_command(&show_call(json!(1), json!("broken"))).await;
        let MethodResponse::Error(err) = resp else {
            panic!("expected error, got {resp:?}");
        };
        assert_eq!(err.code, NOT_FOUND);
        assert_eq!(err.message.as_deref(), Some(ENGINE_NOT_FOUND_MESSAGE));
        assert!(f.manager.active_session().await.is_none());
    }

    #[tokio::test]
    async fn test_show_replaces_and_dismisses_previous() {
        let f = fixture();

        let first = assert_ok!(f.manager.show(1, router("a")).await);
        let old_endpoint = f.manager.active_endpoint().await.unwrap();
        let second = assert_ok!(f.manager.show(0, router("b")).await);

        assert_ne!(first.id, second.id);
        assert_eq!(f.platform.visible_windows(), vec![0]);
        assert!(!old_endpoint.is_live());
        assert_err!(
            old_endpoint
                .call(BridgeEnvelope::with_data(methods::UPDATE_SECONDARY_DISPLAY, json!(1)))
                .await
        );
    }

    #[tokio::test]
    async fn test_keep_previous_policy_leaves_surface() {
        let f = fixture_with(PresentationConfig {
            replace_policy: ReplacePolicy::KeepPrevious,
            ..PresentationConfig::default()
        });

        assert_ok!(f.manager.show(1, router("a")).await);
        assert_ok!(f.manager.show(0, router("b")).await);
        assert_eq!(f.platform.visible_windows(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_same_router_reuses_engine() {
        let f = fixture();

        assert_ok!(f.manager.show(1, router("secondary")).await);
        assert_ok!(f.manager.hide().await);
        assert_ok!(f.manager.show(1, router("secondary")).await);
        assert_eq!(f.factory.created(), 1);
    }

    #[tokio::test]
    async fn test_surface_relays_send_data_to_main() {
        let mut f = fixture();
        assert_ok!(f.manager.show(1, router("secondary")).await);
        let endpoint = f.manager.active_endpoint().await.unwrap();

        let resp = assert_ok!(
            endpoint
                .call(BridgeEnvelope::with_data(methods::SEND_DATA_TO_MAIN, json!({"y": 2})))
                .await
        );
        assert_eq!(resp, MethodResponse::success(json!(true)));

        let relayed = f.outbound_rx.recv().await.unwrap();
        assert_eq!(relayed.method, methods::RECEIVED_DATA_FROM_PRESENTATION);
        assert_eq!(relayed.data(), json!({"y": 2}));
    }

    #[tokio::test]
    async fn test_update_reaches_engine() {
        let f = fixture();
        assert_ok!(f.manager.show(1, router("secondary")).await);
        let endpoint = f.manager.active_endpoint().await.unwrap();

        let resp = assert_ok!(
            endpoint
                .call(BridgeEnvelope::with_data(methods::UPDATE_SECONDARY_DISPLAY, json!({"x": 1})))
                .await
        );
        assert!(resp.is_success());

        let engine = f.factory.engine(&router("secondary")).unwrap();
        assert_eq!(engine.launch().initial_route, "secondary");
        assert!(engine.is_resumed());
        assert_eq!(engine.dispatched()[0].data(), json!({"x": 1}));

        let unknown = assert_ok!(endpoint.call(BridgeEnvelope::new("reboot", Value::Null)).await);
        assert_eq!(unknown, MethodResponse::NotImplemented);
    }

    #[tokio::test]
    async fn test_unknown_command_not_implemented() {
        let f = fixture();
        let resp = f
            .manager
            .handle_command(&BridgeEnvelope::new("resizePresentation", Value::Null))
            .await;
        assert_eq!(resp, MethodResponse::NotImplemented);
    }
}
