pub mod appresult;
pub mod config;
pub mod db;
pub mod error;
pub mod rooms;

use axum::{Router, extract::FromRef};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use appresult::{AppError, AppResult};
pub use config::Config;
pub use db::MessageStore;
pub use error::RelayError;
pub use rooms::Rooms;

/// Path prefix under which rooms are addressed.
pub const ROOM_PREFIX: &str = "/parties/chat";

#[derive(Clone, FromRef)]
pub struct AppState {
    pub rooms: Rooms,
}

/// The whole HTTP surface: room routes first, static assets for everything else.
pub fn app(state: AppState, config: &Config) -> Router {
    Router::new()
        .nest(ROOM_PREFIX, rooms::router())
        .fallback_service(ServeDir::new(&config.assets_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
