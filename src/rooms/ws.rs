use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket, rejection::WebSocketUpgradeRejection},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};

use crate::{AppResult, RelayError};

use super::{Payload, Room, Rooms, is_valid_room_name, not_found};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_ws(
    Path(room): Path<String>,
    State(rooms): State<Rooms>,

    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> AppResult<Response> {
    let Ok(ws) = ws else {
        return Ok(not_found());
    };
    if !is_valid_room_name(&room) {
        return Ok(not_found());
    }

    let room = rooms.get_or_start(&room).await?;

    Ok(ws.on_upgrade(move |socket| run_session(socket, room)).into_response())
}

async fn run_session(socket: WebSocket, room: Arc<Room>) {
    let mut session = match room.connect().await {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(room = room.name(), error = %err, "failed to register session");
            return;
        }
    };
    let session_id = session.id;
    let (mut sender, mut receiver) = socket.split();

    if sender.send(Message::Text(session.sync.clone().into())).await.is_err() {
        return;
    }

    let mut forward_task = tokio::spawn(async move {
        while let Some(payload) = session.next_frame().await {
            let msg = match payload {
                Payload::Text(text) => Message::Text(text.into()),
                Payload::Binary(bytes) => Message::Binary(bytes.into()),
            };
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let inbound_room = room.clone();
    let mut inbound_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let payload = match msg {
                Message::Text(text) => Payload::Text(text.as_str().to_owned()),
                Message::Binary(bytes) => Payload::Binary(bytes.to_vec()),
                Message::Close(_) => break,
                _ => continue,
            };

            match inbound_room.on_message(session_id, payload).await {
                Ok(()) => {}
                Err(RelayError::Json(err)) => {
                    tracing::warn!(room = inbound_room.name(), session = %session_id, error = %err, "ignoring malformed message");
                }
                Err(err) => {
                    tracing::error!(room = inbound_room.name(), session = %session_id, error = %err, "failed to apply message");
                }
            }
        }
    });

    // an in-flight message is always finished, never aborted
    tokio::select! {
        _ = &mut inbound_task => forward_task.abort(),
        _ = &mut forward_task => { let _ = inbound_task.await; },
    };

    tracing::debug!(room = room.name(), session = %session_id, "session closed");
}
