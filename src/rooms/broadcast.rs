use axum::{
    body::Bytes,
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::Error as _;
use serde_json::Value;

use crate::AppResult;

use super::{Envelope, Rooms, is_valid_room_name, not_found};

pub const DEFAULT_NOTIFICATION: &str = "new_message";

/// `POST /{room}/broadcast`: push a notification to every session in the room.
///
/// A room that is not running has no sessions, so it is left alone.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn notify(
    Path(room): Path<String>,
    State(rooms): State<Rooms>,

    body: Bytes,
) -> AppResult<Response> {
    if !is_valid_room_name(&room) {
        return Ok(not_found());
    }

    let message = match notification_text(&body) {
        Ok(message) => message,
        Err(err) => {
            tracing::debug!(room = %room, error = %err, "rejecting broadcast body");
            return Ok((StatusCode::BAD_REQUEST, "Bad Request").into_response());
        }
    };

    let Some(room) = rooms.get(&room) else {
        tracing::debug!(room = %room, "no running room, nothing to notify");
        return Ok((StatusCode::OK, "OK").into_response());
    };
    room.broadcast_message(&Envelope::Notification { message }, &[]).await?;
    tracing::debug!(room = room.name(), sessions = room.session_count(), "notification sent");

    Ok((StatusCode::OK, "OK").into_response())
}

/// Any JSON body but `null` is accepted. A `message` that is missing, empty or
/// not a string falls back to [`DEFAULT_NOTIFICATION`].
fn notification_text(body: &[u8]) -> Result<String, serde_json::Error> {
    let body: Value = serde_json::from_slice(body)?;
    if body.is_null() {
        return Err(serde_json::Error::custom("body is null"));
    }

    Ok(body
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_NOTIFICATION)
        .to_owned())
}
