//! Example host serving the presentation bridge over WebSocket.
//!
//! Run with: cargo run -p host-demo
//!
//! Then connect a WebSocket client to ws://localhost:3000/ws and send
//! `{"type":"call","id":1,"channel":"control","method":"listDisplays"}`.
//!
//! Environment:
//! - `PRESENTATION_CONFIG` - path to a JSON config file
//! - `PRESENTATION_ADDR` - bind address (default 127.0.0.1:3000)
//! - `PRESENTATION_SIMULATE_HOTPLUG` - toggle a second external display every 15s

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{Router, response::Html, routing::get};
use presentation_core::{DisplayDescriptor, PresentationConfig};
use presentation_engine::MemoryEngineFactory;
use presentation_session::{DisplayWatcher, platform::MemoryPlatform};
use presentation_transport::{
    MessageBridge,
    websocket::{WsState, create_ws_router},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match std::env::var_os("PRESENTATION_CONFIG") {
        Some(path) => PresentationConfig::from_path(&path)
            .with_context(|| format!("loading config from {}", path.to_string_lossy()))?,
        None => PresentationConfig::default(),
    };

    let platform = Arc::new(MemoryPlatform::with_category(config.presentation_category.clone()));
    platform.attach(DisplayDescriptor::new(0, "Built-in Screen"));
    platform.attach(
        DisplayDescriptor::new(1, "HDMI-1").with_flags(DisplayDescriptor::FLAG_PRESENTATION),
    );

    let ctx = platform
        .context(Arc::new(MemoryEngineFactory::new()))
        .with_config(config);
    let watcher = Arc::new(DisplayWatcher::new(ctx.listeners.clone()));
    let (bridge, host_rx) = MessageBridge::spawn(ctx);

    if std::env::var_os("PRESENTATION_SIMULATE_HOTPLUG").is_some() {
        spawn_hotplug_simulator(Arc::clone(&platform));
    }

    // Build router
    let app = Router::new()
        .route("/", get(index_handler))
        .merge(create_ws_router(WsState::new(bridge, watcher, host_rx)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr: SocketAddr = std::env::var("PRESENTATION_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()
        .context("parsing PRESENTATION_ADDR")?;
    tracing::info!("Server listening on ws://{addr}/ws");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

fn spawn_hotplug_simulator(platform: Arc<MemoryPlatform>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(15));
        let mut attached = false;
        loop {
            interval.tick().await;
            if attached {
                tracing::info!("Simulating detach of HDMI-2");
                platform.detach(2);
            } else {
                tracing::info!("Simulating attach of HDMI-2");
                platform.attach(
                    DisplayDescriptor::new(2, "HDMI-2")
                        .with_flags(DisplayDescriptor::FLAG_PRESENTATION),
                );
            }
            attached = !attached;
        }
    });
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Presentation host</title></head>
<body>
<pre id="log"></pre>
<script>
  const log = (m) => document.getElementById('log').textContent += m + '\n';
  const ws = new WebSocket(`ws://${location.host}/ws`);
  let id = 0;
  const call = (channel, method, payload) =>
    ws.send(JSON.stringify({ type: 'call', id: ++id, channel, method, payload }));
  ws.onopen = () => {
    ws.send(JSON.stringify({ type: 'subscribe' }));
    call('control', 'listDisplays');
    call('control', 'showPresentation', { displayId: 1, routerName: 'secondary' });
    call('to_secondary', 'updateSecondaryDisplay', { data: { hello: 'world' } });
    call('from_secondary', 'sendDataToMain', { data: { y: 2 } });
  };
  ws.onmessage = (e) => log(e.data);
</script>
</body>
</html>
"#;
