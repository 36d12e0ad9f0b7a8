//! WebSocket endpoint feeding the broadcast hub
//!
//! Each connection registers an unbounded channel with the hub as its sink.
//! A writer task drains that channel into the socket while a reader task
//! hands text frames back to the hub.

use std::sync::Arc;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::state::ApiState;
use crate::hub::SubscriberSink;

/// WebSocket upgrade handler
///
/// GET /api/v1/stream
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: ApiState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let sink: Arc<dyn SubscriberSink> = Arc::new(tx);
    let id = match state.hub.connect(sink).await {
        Ok(id) => id,
        Err(e) => {
            warn!("could not register WebSocket subscriber: {e:#}");
            return;
        }
    };
    info!("WebSocket subscriber {id} connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                debug!("WebSocket send failed, client disconnected");
                break;
            }
        }
    });

    let hub = state.hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if hub.incoming(id, text).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                // pings are answered by axum
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    if let Err(e) = state.hub.disconnect(id).await {
        debug!("failed to unregister subscriber {id}: {e:#}");
    }
    info!("WebSocket subscriber {id} disconnected");
}
