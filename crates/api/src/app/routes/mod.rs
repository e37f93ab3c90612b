use axum::Router;

pub mod admin;
pub mod auth;
pub mod system;
pub mod todos;

/// Router for all endpoints that require a bearer token.
pub fn protected() -> Router {
    Router::new()
        .nest("/todos", todos::router())
        .nest("/admin", admin::router())
}
