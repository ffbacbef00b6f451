//! WebSocket transport for host applications.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, Stream, StreamExt, future};
use presentation_core::BridgeEnvelope;
use presentation_session::{DisplayWatcher, SubscriptionHandle};
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use crate::{
    bridge::{HostReceiver, MessageBridge},
    protocol::{CallId, ClientFrame, ServerFrame},
};

/// WebSocket handler state.
#[derive(Clone)]
pub struct WsState {
    bridge: Arc<MessageBridge>,
    watcher: Arc<DisplayWatcher>,
    host_rx: Arc<AsyncMutex<Option<HostReceiver>>>,
}

impl WsState {
    /// Create new WebSocket state.
    ///
    /// Only one connection at a time acts as the host and owns `host_rx`.
    #[must_use]
    pub fn new(bridge: Arc<MessageBridge>, watcher: Arc<DisplayWatcher>, host_rx: HostReceiver) -> Self {
        Self {
            bridge,
            watcher,
            host_rx: Arc::new(AsyncMutex::new(Some(host_rx))),
        }
    }
}

/// WebSocket upgrade handler.
///
/// Use this as an Axum route handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let (mut sender, receiver) = socket.split();

    // Channel for sending frames to the client
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let json = match frame.to_json() {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize frame: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let Some(mut host_rx) = state.host_rx.lock().await.take() else {
        tracing::warn!("Rejecting connection, a host is already attached");
        let _ = tx.send(ServerFrame::Error {
            message: "Another host is already connected".to_string(),
        });
        drop(tx);
        let _ = send_task.await;
        return;
    };
    tracing::info!("Host connected");

    let incoming = receiver
        .inspect(|msg| {
            if let Err(e) = msg {
                tracing::error!("WebSocket error: {e}");
            }
        })
        .take_while(|msg| future::ready(matches!(msg, Ok(m) if !matches!(m, Message::Close(_)))))
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(text.as_str().to_owned()),
                Ok(Message::Binary(data)) => String::from_utf8(data.to_vec()).ok(),
                _ => None,
            })
        });
    serve_frames(&state.bridge, &state.watcher, &mut host_rx, Box::pin(incoming), tx).await;

    *state.host_rx.lock().await = Some(host_rx);
    tracing::info!("Host disconnected");

    send_task.abort();
}

/// Dispatch client frames until `incoming` ends.
///
/// Every accepted call is answered with exactly one `Response`. Host
/// notifications are interleaved as they arrive. Any display
/// subscription opened here is cancelled before returning.
async fn serve_frames<S>(
    bridge: &Arc<MessageBridge>,
    watcher: &DisplayWatcher,
    host_rx: &mut HostReceiver,
    mut incoming: S,
    tx: mpsc::UnboundedSender<ServerFrame>,
) where
    S: Stream<Item = String> + Unpin,
{
    let pending: Arc<Mutex<HashSet<CallId>>> = Arc::new(Mutex::new(HashSet::new()));
    let mut subscription: Option<SubscriptionHandle> = None;

    loop {
        tokio::select! {
            notification = host_rx.recv() => {
                let Some(envelope) = notification else { break };
                let _ = tx.send(ServerFrame::notification(envelope));
            }
            text = incoming.next() => {
                let Some(text) = text else { break };

                let frame = match ClientFrame::parse(&text) {
                    Ok(f) => f,
                    Err(e) => {
                        tracing::warn!("Invalid client frame: {e}");
                        let _ = tx.send(ServerFrame::Error {
                            message: format!("Invalid frame: {e}"),
                        });
                        continue;
                    }
                };

                match frame {
                    ClientFrame::Ping => {
                        let _ = tx.send(ServerFrame::Pong);
                    }
                    ClientFrame::Call { id, channel, method, payload } => {
                        let fresh = pending.lock().map(|mut p| p.insert(id)).unwrap_or(false);
                        if !fresh {
                            let _ = tx.send(ServerFrame::Error {
                                message: format!("Call id {id} is already in flight"),
                            });
                            continue;
                        }
                        let bridge = Arc::clone(bridge);
                        let pending = Arc::clone(&pending);
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            let result = bridge.call(channel, BridgeEnvelope::new(method, payload)).await;
                            if let Ok(mut p) = pending.lock() {
                                p.remove(&id);
                            }
                            let _ = tx.send(ServerFrame::Response { id, result });
                        });
                    }
                    ClientFrame::Subscribe => match watcher.subscribe() {
                        Ok(mut sub) => {
                            subscription = Some(sub.handle());
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                while let Some(event) = sub.recv().await {
                                    if tx.send(ServerFrame::display_event(event)).is_err() {
                                        break;
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Display subscription failed: {e}");
                            let _ = tx.send(ServerFrame::Error { message: e.to_string() });
                        }
                    },
                    ClientFrame::Unsubscribe => {
                        if let Some(handle) = subscription.take() {
                            handle.cancel();
                        }
                    }
                }
            }
        }
    }

    if let Some(handle) = subscription.take() {
        handle.cancel();
    }
}

/// Create WebSocket router.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .merge(create_ws_router(state));
/// ```
#[must_use]
pub fn create_ws_router(state: WsState) -> axum::Router {
    axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state)
}
