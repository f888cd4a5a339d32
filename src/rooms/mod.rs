mod broadcast;
mod msg;
mod registry;
mod room;
mod ws;

use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::AppState;

pub use broadcast::DEFAULT_NOTIFICATION;
pub use msg::{ChatMessage, Envelope};
pub use registry::{Rooms, is_valid_room_name};
pub use room::{Frame, Payload, Room, Session, SessionId};

/// Routes for one room, meant to be nested under the room prefix.
///
/// Anything that is not a WebSocket upgrade on `/{room}` or a POST to
/// `/{room}/broadcast` is a 404.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{room}", get(ws::room_ws).fallback(not_found_handler))
        .route("/{room}/broadcast", post(broadcast::notify).fallback(not_found_handler))
        .fallback(not_found_handler)
}

pub(crate) fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

async fn not_found_handler() -> Response {
    not_found()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use axum::{
        body::Body,
        http::{Method, Request},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{Config, app};

    fn test_app(dir: &Path) -> (Router, Rooms) {
        let config = Config {
            data_dir: dir.join("data"),
            assets_dir: dir.join("public"),
            ..Config::default()
        };
        let rooms = Rooms::new(config.data_dir.clone(), config.channel_capacity);
        let state = AppState { rooms: rooms.clone() };
        (app(state, &config), rooms)
    }

    fn request(method: Method, uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn broadcast_reaches_every_session() {
        let dir = tempfile::tempdir().unwrap();
        let (app, rooms) = test_app(dir.path());
        let room = rooms.get_or_start("lobby").await.unwrap();
        let mut first = room.connect().await.unwrap();
        let mut second = room.connect().await.unwrap();

        let resp = app
            .oneshot(request(Method::POST, "/parties/chat/lobby/broadcast", r#"{"message":"hello"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "OK");

        let expected = Envelope::Notification { message: "hello".to_owned() };
        for session in [&mut first, &mut second] {
            let got = session.next_frame().await.unwrap().decode().unwrap();
            assert_eq!(got, expected);
        }
    }

    #[tokio::test]
    async fn broadcast_without_message_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let (app, rooms) = test_app(dir.path());
        let room = rooms.get_or_start("lobby").await.unwrap();
        let mut session = room.connect().await.unwrap();

        let resp = app
            .oneshot(request(Method::POST, "/parties/chat/lobby/broadcast", "{}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let got = session.next_frame().await.unwrap().decode().unwrap();
        assert_eq!(got, Envelope::Notification { message: DEFAULT_NOTIFICATION.to_owned() });
    }

    #[tokio::test]
    async fn broadcast_with_invalid_json_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (app, rooms) = test_app(dir.path());
        let room = rooms.get_or_start("lobby").await.unwrap();
        let mut session = room.connect().await.unwrap();

        let resp = app
            .oneshot(request(Method::POST, "/parties/chat/lobby/broadcast", "{oops"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(resp).await, "Bad Request");
        assert_eq!(session.try_next_frame(), None);
    }

    #[tokio::test]
    async fn get_broadcast_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path());

        let resp = app
            .oneshot(request(Method::GET, "/parties/chat/lobby/broadcast", ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(resp).await, "Not Found");
    }

    #[tokio::test]
    async fn post_to_other_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path());

        for uri in ["/parties/chat/lobby/announce", "/parties/chat/lobby", "/parties/chat/lobby/broadcast/extra"] {
            let resp = app
                .clone()
                .oneshot(request(Method::POST, uri, r#"{"message":"hello"}"#))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn plain_get_on_room_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path());

        let resp = app
            .oneshot(request(Method::GET, "/parties/chat/lobby", ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_room_name_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path());

        let resp = app
            .oneshot(request(Method::POST, "/parties/chat/bad.name/broadcast", "{}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(!dir.path().join("data").join("bad.name.sqlite").exists());
    }

    #[tokio::test]
    async fn non_object_bodies_use_default() {
        let dir = tempfile::tempdir().unwrap();
        let (app, rooms) = test_app(dir.path());
        let room = rooms.get_or_start("lobby").await.unwrap();
        let mut session = room.connect().await.unwrap();

        for body in ["[]", r#""x""#, r#"{"message":5}"#] {
            let resp = app
                .clone()
                .oneshot(request(Method::POST, "/parties/chat/lobby/broadcast", body))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{body}");

            let got = session.next_frame().await.unwrap().decode().unwrap();
            assert_eq!(got, Envelope::Notification { message: DEFAULT_NOTIFICATION.to_owned() });
        }
    }

    #[tokio::test]
    async fn null_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path());

        let resp = app
            .oneshot(request(Method::POST, "/parties/chat/lobby/broadcast", "null"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn broadcast_to_idle_room_starts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (app, rooms) = test_app(dir.path());

        let resp = app
            .oneshot(request(Method::POST, "/parties/chat/ghost/broadcast", r#"{"message":"hello"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(rooms.get("ghost").is_none());
        assert!(!dir.path().join("data").join("ghost.sqlite").exists());
    }
}
