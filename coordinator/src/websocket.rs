//! Notification WebSocket of the web UI.
//!
//! Each client connection becomes the user's slot in the [`ConnectionRegistry`]. Server side
//! writes go through the registry; this module only owns the read half.

use alloc::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use eyre::WrapErr as _;
use futures::{SinkExt as _, StreamExt as _, stream::SplitSink};
use serde::{Deserialize, Serialize};
use tokio::{sync::Mutex, time};
use tracing::{Instrument as _, debug, info, warn};

use crate::{
    app::AppState,
    http::identity::CurrentUser,
    notifications::{ConnectionRegistry, LiveChannel},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WsMessage {
    /// A notification was stored for the connected user.
    Notification {
        id: i64,
        message: String,
        created_at: DateTime<Utc>,
    },
}

/// Write half of an upgraded socket.
struct WsChannel(Mutex<SplitSink<WebSocket, Message>>);

#[async_trait]
impl LiveChannel for WsChannel {
    async fn send(&self, message: &WsMessage) -> eyre::Result<()> {
        let json = serde_json::to_string(message).wrap_err("Failed to serialize message")?;
        self.0
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await
            .wrap_err("Failed to write message")
    }

    async fn ping(&self) -> eyre::Result<()> {
        self.0
            .lock()
            .await
            .send(Message::Ping(Bytes::new()))
            .await
            .wrap_err("Failed to write ping")
    }

    async fn close(&self) {
        if let Err(e) = self.0.lock().await.close().await {
            debug!("Closing websocket failed: {e}");
        }
    }
}

/// Upgrades the request and hands the connection to the notification registry.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    user: CurrentUser,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let registry = Arc::clone(state.notifications.registry());
    let read_deadline = state.config.notifications.read_deadline();
    let span = tracing::info_span!("ws", user = %user.0.username);
    ws.on_upgrade(move |socket| {
        run_connection(socket, registry, user.0.id, read_deadline).instrument(span)
    })
}

async fn run_connection(
    socket: WebSocket,
    registry: Arc<ConnectionRegistry>,
    user_id: i64,
    read_deadline: core::time::Duration,
) {
    let (sink, mut stream) = socket.split();
    let channel = Arc::new(WsChannel(Mutex::new(sink)));
    let id = match registry
        .register(user_id, Arc::clone(&channel) as Arc<dyn LiveChannel>)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            warn!("Failed to deliver pooled notifications: {e:#}");
            channel.close().await;
            return;
        }
    };
    info!(connection = id, "WebSocket connected");

    // Clients only send pongs and close frames; anything else is ignored.
    loop {
        match time::timeout(read_deadline, stream.next()).await {
            Ok(Some(Ok(Message::Close(_)) | Err(_)) | None) => break,
            Ok(Some(Ok(_))) => {}
            Err(_) => {
                info!(connection = id, "No traffic within read deadline");
                break;
            }
        }
    }

    if registry.unregister(user_id, id).await {
        channel.close().await;
    }
    info!(connection = id, "WebSocket closed");
}
