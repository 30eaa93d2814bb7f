//! BLOGGY: a blogging platform backend with real-time updates.
//!
//! REST handlers persist users and blogs in Postgres; every committed
//! mutation is published to an in-process event hub that fans change
//! events out to websocket clients by room and relays typing signals.

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::AppError;
pub use handlers::http::AppState;
pub use services::EventHub;

use axum::routing::{get, post, put};
use handlers::http;

/// Build the API router (users, blogs, ws, health). Used by main and by integration tests.
pub fn create_app(state: AppState) -> axum::Router {
    let user_routes = axum::Router::new()
        .route("/", get(handlers::users::list_users))
        .route("/signup", post(handlers::users::signup))
        .route("/login", post(handlers::users::login))
        .route("/update/:id", put(handlers::users::update_profile))
        .route("/:id", get(handlers::users::get_user));

    let blog_routes = axum::Router::new()
        .route("/", get(handlers::blogs::list_blogs))
        .route("/search", get(handlers::blogs::search_blogs))
        .route("/stats", get(handlers::blogs::blog_stats))
        .route("/add", post(handlers::blogs::create_blog))
        .route("/update/:id", put(handlers::blogs::update_blog))
        .route("/user/:id", get(handlers::blogs::user_blogs))
        .route(
            "/:id",
            get(handlers::blogs::get_blog).delete(handlers::blogs::delete_blog),
        );

    axum::Router::new()
        .route("/", get(http::root))
        .route("/health", get(http::health))
        .route("/ws", get(handlers::ws::ws_handler))
        .nest("/api/user", user_routes)
        .nest("/api/blog", blog_routes)
        .with_state(state)
}
