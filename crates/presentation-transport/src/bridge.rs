//! Three-channel message bridge between host, manager and secondary surface.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use presentation_core::{BridgeEnvelope, Channel, MethodResponse, PlatformContext, envelope::methods};
use presentation_engine::{EngineRegistry, EntrypointBuilder};
use presentation_session::SessionManager;
use tokio::sync::mpsc;

/// Code returned when a surface call arrives with no active session.
pub const NO_ACTIVE_SESSION: &str = "NO_ACTIVE_SESSION";

/// Receiver for notifications addressed to the host.
pub type HostReceiver = mpsc::Receiver<BridgeEnvelope>;

/// Destination of a relayed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Target channel.
    pub target: Channel,
    /// Method name on the target channel.
    pub method: String,
}

/// Directed relay table `{source channel, method} -> {target channel, method}`.
#[derive(Debug, Clone)]
pub struct RelayTable {
    routes: HashMap<(Channel, String), Route>,
}

impl RelayTable {
    /// Empty table.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Add a route, replacing any existing one for the same source.
    #[must_use]
    pub fn with_route(
        mut self,
        source: Channel,
        method: impl Into<String>,
        target: Channel,
        target_method: impl Into<String>,
    ) -> Self {
        self.routes.insert(
            (source, method.into()),
            Route {
                target,
                method: target_method.into(),
            },
        );
        self
    }

    /// Look up the route for a message.
    #[must_use]
    pub fn resolve(&self, source: Channel, method: &str) -> Option<&Route> {
        self.routes.get(&(source, method.to_string()))
    }
}

impl Default for RelayTable {
    /// Surface data goes to the host; host pushes become surface updates.
    fn default() -> Self {
        Self::empty()
            .with_route(
                Channel::FromSecondary,
                methods::RECEIVED_DATA_FROM_PRESENTATION,
                Channel::Host,
                methods::RECEIVED_DATA_FROM_PRESENTATION,
            )
            .with_route(
                Channel::ToSecondary,
                methods::RECEIVED_DATA_FROM_MAIN,
                Channel::ToSecondary,
                methods::UPDATE_SECONDARY_DISPLAY,
            )
    }
}

/// Routes method calls between the host, the session manager and the
/// active secondary surface.
///
/// Every call produces exactly one [`MethodResponse`].
pub struct MessageBridge {
    manager: Arc<SessionManager>,
    relays: RelayTable,
    host_tx: mpsc::Sender<BridgeEnvelope>,
}

impl MessageBridge {
    /// Build the manager and bridge with the default relay table.
    ///
    /// Must be called inside a tokio runtime; spawns the relay task.
    #[must_use]
    pub fn spawn(ctx: PlatformContext) -> (Arc<Self>, HostReceiver) {
        Self::spawn_with_relays(ctx, RelayTable::default())
    }

    /// Build the manager and bridge with a custom relay table.
    #[must_use]
    pub fn spawn_with_relays(ctx: PlatformContext, relays: RelayTable) -> (Arc<Self>, HostReceiver) {
        let capacity = ctx.config.host_event_capacity.max(1);
        let (host_tx, host_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);

        let engines = Arc::new(EngineRegistry::with_entrypoint(
            Arc::clone(&ctx.engines),
            EntrypointBuilder::new(ctx.config.entrypoint.clone()),
        ));
        let manager = Arc::new(SessionManager::new(ctx, engines, outbound_tx));

        let bridge = Arc::new(Self {
            manager,
            relays,
            host_tx,
        });
        Self::spawn_relay_loop(Arc::downgrade(&bridge), outbound_rx);

        (bridge, host_rx)
    }

    fn spawn_relay_loop(bridge: Weak<Self>, mut outbound_rx: mpsc::Receiver<BridgeEnvelope>) {
        tokio::spawn(async move {
            while let Some(envelope) = outbound_rx.recv().await {
                let Some(bridge) = bridge.upgrade() else {
                    break;
                };
                bridge.relay(Channel::FromSecondary, envelope).await;
            }
            tracing::debug!("Relay loop finished");
        });
    }

    /// Session manager behind the Control channel.
    #[must_use]
    pub const fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Relay table in use.
    #[must_use]
    pub const fn relays(&self) -> &RelayTable {
        &self.relays
    }

    /// Handle one inbound call on `channel`.
    pub async fn call(&self, channel: Channel, envelope: BridgeEnvelope) -> MethodResponse {
        tracing::debug!(%channel, method = %envelope.method, "Bridge call");
        match channel {
            Channel::Control => self.manager.handle_command(&envelope).await,
            Channel::ToSecondary | Channel::FromSecondary => {
                let envelope = match self.relays.resolve(channel, &envelope.method) {
                    Some(route) if route.target == channel => {
                        BridgeEnvelope::new(route.method.clone(), envelope.payload)
                    }
                    Some(_) => return self.relay(channel, envelope).await,
                    None => envelope,
                };
                self.call_surface(channel, envelope).await
            }
            Channel::Host => {
                tracing::warn!(method = %envelope.method, "Host channel does not accept calls");
                MethodResponse::NotImplemented
            }
        }
    }

    async fn call_surface(&self, channel: Channel, envelope: BridgeEnvelope) -> MethodResponse {
        let accepted = match channel {
            Channel::ToSecondary => envelope.method == methods::UPDATE_SECONDARY_DISPLAY,
            Channel::FromSecondary => envelope.method == methods::SEND_DATA_TO_MAIN,
            Channel::Control | Channel::Host => false,
        };
        if !accepted {
            tracing::warn!(%channel, method = %envelope.method, "Bridge method not implemented");
            return MethodResponse::NotImplemented;
        }

        let Some(endpoint) = self.manager.active_endpoint().await else {
            return MethodResponse::error(NO_ACTIVE_SESSION, "No presentation is showing");
        };
        match endpoint.call(envelope).await {
            Ok(response) => response,
            Err(e) => MethodResponse::error(NO_ACTIVE_SESSION, e.to_string()),
        }
    }

    /// Apply the relay table to a message emitted on `source`.
    async fn relay(&self, source: Channel, envelope: BridgeEnvelope) -> MethodResponse {
        let Some(route) = self.relays.resolve(source, &envelope.method).cloned() else {
            tracing::warn!(%source, method = %envelope.method, "No relay route, message dropped");
            return MethodResponse::NotImplemented;
        };
        let relayed = BridgeEnvelope::new(route.method, envelope.payload);

        match route.target {
            Channel::Host => self.notify_host(relayed),
            Channel::Control => self.manager.handle_command(&relayed).await,
            Channel::ToSecondary | Channel::FromSecondary => {
                self.call_surface(route.target, relayed).await
            }
        }
    }

    fn notify_host(&self, envelope: BridgeEnvelope) -> MethodResponse {
        tracing::debug!(method = %envelope.method, "Notifying host");
        match self.host_tx.try_send(envelope) {
            Ok(()) => MethodResponse::success(true.into()),
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::warn!(method = %dropped.method, "Host queue full, notification dropped");
                MethodResponse::error("RELAY_ERROR", "Host queue full")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                MethodResponse::error("RELAY_ERROR", "Host receiver closed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use presentation_core::DisplayDescriptor;
    use presentation_engine::MemoryEngineFactory;
    use presentation_session::platform::MemoryPlatform;
    use serde_json::{Value, json};

    use super::*;

    fn setup() -> (Arc<MemoryPlatform>, Arc<MessageBridge>, HostReceiver) {
        let platform = Arc::new(MemoryPlatform::new());
        platform.attach(
            DisplayDescriptor::new(1, "HDMI-1").with_flags(DisplayDescriptor::FLAG_PRESENTATION),
        );
        let ctx = platform.context(Arc::new(MemoryEngineFactory::new()));
        let (bridge, host_rx) = MessageBridge::spawn(ctx);
        (platform, bridge, host_rx)
    }

    async fn show(bridge: &MessageBridge, display_id: i64) -> MethodResponse {
        bridge
            .call(
                Channel::Control,
                BridgeEnvelope::new(
                    methods::SHOW_PRESENTATION,
                    json!({"displayId": display_id, "routerName": "secondary"}),
                ),
            )
            .await
    }

    #[tokio::test]
    async fn test_list_single_display() {
        let (_platform, bridge, _host_rx) = setup();

        let resp = bridge
            .call(Channel::Control, BridgeEnvelope::new(methods::LIST_DISPLAYS, Value::Null))
            .await;
        let decoded: Value = serde_json::from_str(resp.value().unwrap().as_str().unwrap()).unwrap();
        assert_eq!(
            decoded,
            json!([{"displayId": 1, "flags": 8, "rotation": 0, "name": "HDMI-1"}])
        );
    }

    #[tokio::test]
    async fn test_show_then_update() {
        let (_platform, bridge, _host_rx) = setup();

        assert_eq!(show(&bridge, 1).await, MethodResponse::success(json!(true)));
        let resp = bridge
            .call(
                Channel::ToSecondary,
                BridgeEnvelope::with_data(methods::UPDATE_SECONDARY_DISPLAY, json!({"x": 1})),
            )
            .await;
        assert_eq!(resp, MethodResponse::success(json!(true)));
    }

    #[tokio::test]
    async fn test_show_missing_display_creates_no_session() {
        let (_platform, bridge, _host_rx) = setup();

        let resp = show(&bridge, 99).await;
        assert!(matches!(resp, MethodResponse::Error(ref e) if e.code == "404"));
        assert!(bridge.manager().active_session().await.is_none());
    }

    #[tokio::test]
    async fn test_update_fails_after_hide() {
        let (_platform, bridge, _host_rx) = setup();
        show(&bridge, 1).await;

        let hide = BridgeEnvelope::new(methods::HIDE_PRESENTATION, Value::Null);
        assert!(bridge.call(Channel::Control, hide).await.is_success());

        let resp = bridge
            .call(
                Channel::ToSecondary,
                BridgeEnvelope::with_data(methods::UPDATE_SECONDARY_DISPLAY, json!({"x": 1})),
            )
            .await;
        assert!(matches!(resp, MethodResponse::Error(ref e) if e.code == NO_ACTIVE_SESSION));
    }

    #[tokio::test]
    async fn test_send_data_to_main_reaches_host_once() {
        let (_platform, bridge, mut host_rx) = setup();
        show(&bridge, 1).await;

        let ack = bridge
            .call(
                Channel::FromSecondary,
                BridgeEnvelope::with_data(methods::SEND_DATA_TO_MAIN, json!({"y": 2})),
            )
            .await;
        assert_eq!(ack, MethodResponse::success(json!(true)));

        let received = tokio::time::timeout(Duration::from_secs(1), host_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.method, methods::RECEIVED_DATA_FROM_PRESENTATION);
        assert_eq!(received.data(), json!({"y": 2}));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(host_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_received_data_from_main_is_rewritten() {
        let (_platform, bridge, _host_rx) = setup();
        show(&bridge, 1).await;

        let resp = bridge
            .call(
                Channel::ToSecondary,
                BridgeEnvelope::with_data(methods::RECEIVED_DATA_FROM_MAIN, json!("hello")),
            )
            .await;
        assert!(resp.is_success());
    }

    #[tokio::test]
    async fn test_unknown_methods_not_implemented() {
        let (_platform, bridge, _host_rx) = setup();
        show(&bridge, 1).await;

        for channel in [
            Channel::Control,
            Channel::ToSecondary,
            Channel::FromSecondary,
            Channel::Host,
        ] {
            let resp = bridge.call(channel, BridgeEnvelope::new("bogus", Value::Null)).await;
            assert_eq!(resp, MethodResponse::NotImplemented, "channel {channel}");
        }

        let wrong_channel = bridge
            .call(
                Channel::ToSecondary,
                BridgeEnvelope::with_data(methods::SEND_DATA_TO_MAIN, json!(1)),
            )
            .await;
        assert_eq!(wrong_channel, MethodResponse::NotImplemented);
    }

    #[tokio::test]
    async fn test_custom_route_to_host() {
        let platform = Arc::new(MemoryPlatform::new());
        let ctx = platform.context(Arc::new(MemoryEngineFactory::new()));
        let relays = RelayTable::default().with_route(
            Channel::ToSecondary,
            "ping",
            Channel::Host,
            "pong",
        );
        let (bridge, mut host_rx) = MessageBridge::spawn_with_relays(ctx, relays);

        let resp = bridge
            .call(Channel::ToSecondary, BridgeEnvelope::with_data("ping", json!(7)))
            .await;
        assert!(resp.is_success());
        let received = host_rx.recv().await.unwrap();
        assert_eq!(received.method, "pong");
        assert_eq!(received.data(), json!(7));
    }
}
