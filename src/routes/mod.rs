pub mod api;
pub mod assets;
pub mod auth;
pub mod events;
pub mod home;
pub mod news;
pub mod questions;
pub mod users;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full application router with state applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .merge(questions::router())
        .merge(news::router())
        .merge(users::router())
        .merge(events::router())
        .merge(api::router())
        .merge(auth::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
