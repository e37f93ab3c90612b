//! HTTP application wiring (axum router + error boundary).
//!
//! - `services.rs`: shared state (database, token issuer, password hasher)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and request validation
//! - `extract.rs`: extractors whose rejections use the error envelope
//! - `errors.rs`: the error boundary and dispatcher

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    trace::{DefaultOnFailure, TraceLayer},
};
use tracing::Level;

use tasklane_auth::JwtValidator;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    let jwt: Arc<dyn JwtValidator> = services.tokens.clone();
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a valid bearer token.
    let protected = routes::protected().route_layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    let router = Router::new()
        .route("/health", get(routes::system::health))
        .nest("/auth", routes::auth::router())
        .merge(protected)
        .layer(Extension(services));

    with_error_boundary(router)
}

/// Route every failure `router` can produce through the dispatcher: handler
/// errors, unknown routes, bare framework responses, and panics.
///
/// The dispatcher owns the error-level log for a failed request, so the trace
/// layer reports 5xx responses at debug only.
pub fn with_error_boundary(router: Router) -> Router {
    router
        .fallback(errors::not_found_fallback)
        .layer(axum::middleware::map_response(errors::envelope_bare_errors))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .on_failure(DefaultOnFailure::new().level(Level::DEBUG)),
                )
                .layer(CatchPanicLayer::custom(errors::panic_response)),
        )
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::{EnvFilter, Layer};

    use super::*;
    use crate::app::errors::ApiError;

    #[derive(Clone, Default)]
    struct CapturedEvents(Arc<Mutex<Vec<(Level, String)>>>);

    impl<S: Subscriber> Layer<S> for CapturedEvents {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let meta = event.metadata();
            self.0
                .lock()
                .unwrap()
                .push((*meta.level(), meta.target().to_string()));
        }
    }

    async fn failing() -> Result<&'static str, ApiError> {
        Err(anyhow::anyhow!("null deref").into())
    }

    async fn exploding() -> &'static str {
        panic!("index out of bounds");
    }

    async fn error_events_for(path: &str) -> (StatusCode, Vec<(Level, String)>) {
        let captured = CapturedEvents::default();
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new("info"))
            .with(captured.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let app = with_error_boundary(
            Router::new()
                .route("/failing", get(failing))
                .route("/exploding", get(exploding)),
        );
        let response = app
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let errors = captured
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, _)| *level == Level::ERROR)
            .cloned()
            .collect();
        (response.status(), errors)
    }

    #[tokio::test]
    async fn unexpected_error_is_logged_once_through_the_full_stack() {
        let (status, errors) = error_events_for("/failing").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(errors[0].1, "tasklane_api::app::errors");
    }

    #[tokio::test]
    async fn panic_is_logged_once_through_the_full_stack() {
        let (status, errors) = error_events_for("/exploding").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(errors[0].1, "tasklane_api::app::errors");
    }
}
