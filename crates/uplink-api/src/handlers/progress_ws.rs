//! Live progress subscriptions over WebSocket.

use crate::services::Subscription;
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use serde::Serialize;
use std::sync::Arc;
use uplink_core::models::{session_key, ControlFrame, ProgressMessage, UploadSession};

/// Upgrade to a WebSocket that receives every lifecycle frame of `upload_id`.
pub async fn progress_ws(
    ws: WebSocketUpgrade,
    Path(upload_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| progress_ws_task(socket, upload_id, state))
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, frame: &T) -> bool {
    match serde_json::to_string(frame) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize WebSocket frame");
            true
        }
    }
}

/// Persisted state of the upload, if any, as a `status` frame.
async fn snapshot(state: &AppState, upload_id: &str) -> Option<ProgressMessage> {
    match state.store.hgetall(&session_key(upload_id)).await {
        Ok(raw) => UploadSession::from_fields(upload_id, &raw).map(|s| ProgressMessage::snapshot(&s)),
        Err(e) => {
            tracing::warn!(upload_id = %upload_id, error = %e, "Failed to load upload snapshot");
            None
        }
    }
}

async fn progress_ws_task(mut socket: WebSocket, upload_id: String, state: Arc<AppState>) {
    let Subscription {
        id: subscriber_id,
        mut receiver,
        ..
    } = state.hub.subscribe(&upload_id).await;

    tracing::info!(upload_id = %upload_id, subscriber_id = %subscriber_id, "Progress subscriber connected");

    let mut open = send_json(
        &mut socket,
        &ControlFrame::Connected {
            upload_id: upload_id.clone(),
        },
    )
    .await;

    if open {
        if let Some(frame) = snapshot(&state, &upload_id).await {
            open = send_json(&mut socket, &frame).await;
        }
    }

    while open {
        tokio::select! {
            incoming = socket.recv() => {
                let message = match incoming {
                    Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                    Some(Ok(Message::Binary(data))) => String::from_utf8_lossy(&data).into_owned(),
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(upload_id = %upload_id, error = %e, "WebSocket read failed");
                        break;
                    }
                };
                let echo = ControlFrame::Echo {
                    upload_id: upload_id.clone(),
                    message,
                };
                open = send_json(&mut socket, &echo).await;
            }
            frame = receiver.recv() => {
                match frame {
                    Some(frame) => {
                        open = socket
                            .send(Message::Text(frame.to_string().into()))
                            .await
                            .is_ok();
                    }
                    None => break,
                }
            }
        }
    }

    state.hub.unsubscribe(&upload_id, subscriber_id).await;
    tracing::info!(upload_id = %upload_id, subscriber_id = %subscriber_id, "Progress subscriber disconnected");
}
