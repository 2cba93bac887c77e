use axum::{Router, routing::get};

pub mod activity;
pub mod assets;
pub mod auth;
pub mod common;
pub mod custody;
pub mod system;
pub mod users;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/activity", get(activity::recent))
        .nest("/assets", assets::router())
        .nest("/library", custody::router::<custodia_library::BookKind>())
        .nest("/users", users::router())
}

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/auth", auth::router())
}
