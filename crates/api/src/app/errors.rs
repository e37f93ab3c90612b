//! Error boundary: every failure that reaches a handler's return value is
//! classified here exactly once and rendered as a [`ResponseEnvelope`].
//!
//! Matching order (first match wins):
//!
//! 1. [`ApiError::Failure`]: already classified, used as-is.
//! 2. [`ApiError::Persistence`] carrying a constraint violation: mapped by the
//!    violated constraint, falling back to the generic duplicate and
//!    constraint kinds.
//! 3. [`ApiError::Persistence`] carrying an operational error: database
//!    operation failed.
//! 4. [`ApiError::Http`]: framework-level error, status and message pass
//!    through.
//! 5. [`ApiError::Unexpected`] and handler panics: internal error.
//!
//! Server faults are logged here, once, with full detail. Client faults are
//! not logged. Server-side detail never reaches the envelope.

use std::any::Any;

use axum::extract::rejection::{FormRejection, JsonRejection, PathRejection};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use tasklane_auth::AuthError;
use tasklane_core::{ErrorKind, Failure, ResponseEnvelope};
use tasklane_infra::{ConstraintKind, ConstraintViolation, PersistenceError};

/// Error type returned by every handler and middleware.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Failure(#[from] Failure),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Framework-level error that already carries its status.
    #[error("{status}: {message}")]
    Http { status: StatusCode, message: String },

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl ApiError {
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::http(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::http(StatusCode::BAD_REQUEST, message)
    }
}

/// Message for any bearer token that fails verification.
pub const INVALID_TOKEN_MESSAGE: &str = "Could not validate user";

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidToken(_) | AuthError::Claims(_) => {
                Failure::authentication_failed(INVALID_TOKEN_MESSAGE).into()
            }
            AuthError::Sign(_) | AuthError::Hash(_) => ApiError::Unexpected(value.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::http(value.status(), value.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(value: FormRejection) -> Self {
        Self::http(value.status(), value.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(value: PathRejection) -> Self {
        Self::http(value.status(), value.body_text())
    }
}

/// Outcome of dispatching one failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub status: StatusCode,
    pub envelope: ResponseEnvelope,
}

impl IntoResponse for Dispatched {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}

/// Classify `err`, emit at most one log entry, and render its envelope.
pub fn dispatch(err: ApiError) -> Dispatched {
    let envelope = match err {
        ApiError::Failure(failure) => {
            if failure.kind().is_server_fault() {
                tracing::error!(
                    error_code = failure.kind().error_code(),
                    context = ?failure.context(),
                    "{}",
                    failure.message()
                );
            }
            ResponseEnvelope::from_failure(&failure)
        }
        ApiError::Persistence(PersistenceError::Constraint {
            operation,
            violation,
        }) => {
            let failure = classify_constraint(&violation);
            if matches!(
                failure.kind(),
                ErrorKind::DuplicateRecord | ErrorKind::ConstraintViolation
            ) {
                tracing::warn!(
                    operation,
                    constraint = %violation.kind,
                    target = violation.target.as_deref().unwrap_or("<unknown>"),
                    table = violation.table().unwrap_or("<unknown>"),
                    detail = %violation.detail,
                    "unclassified constraint violation"
                );
            }
            ResponseEnvelope::from_failure(&failure)
        }
        ApiError::Persistence(err) => {
            tracing::error!(
                operation = err.operation(),
                error = ?err,
                "database operation failed"
            );
            ResponseEnvelope::from_failure(&Failure::database_operation(err.operation()))
        }
        ApiError::Http { status, message } => {
            ResponseEnvelope::passthrough(status.as_u16(), message)
        }
        ApiError::Unexpected(err) => {
            tracing::error!(error = ?err, "unexpected error");
            ResponseEnvelope::from_failure(&Failure::internal())
        }
    };

    let status =
        StatusCode::from_u16(envelope.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Dispatched { status, envelope }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        dispatch(self).into_response()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum UniqueTarget {
    Username,
    Email,
}

/// Uniqueness constraints we model explicitly, by `table.column` (SQLite) or
/// constraint name (Postgres naming).
const KNOWN_UNIQUE_TARGETS: &[(&str, UniqueTarget)] = &[
    ("users.username", UniqueTarget::Username),
    ("users_username_key", UniqueTarget::Username),
    ("users.email", UniqueTarget::Email),
    ("users_email_key", UniqueTarget::Email),
];

fn classify_constraint(violation: &ConstraintViolation) -> Failure {
    match violation.kind {
        ConstraintKind::Unique => {
            let known = violation.target.as_deref().and_then(|target| {
                KNOWN_UNIQUE_TARGETS
                    .iter()
                    .find(|(name, _)| *name == target)
                    .map(|(_, t)| *t)
            });
            let attempted = violation.attempted.clone();
            match known {
                Some(UniqueTarget::Username) => attempted.map_or_else(
                    || Failure::bare(ErrorKind::UsernameAlreadyExists),
                    Failure::username_taken,
                ),
                Some(UniqueTarget::Email) => attempted.map_or_else(
                    || Failure::bare(ErrorKind::EmailAlreadyExists),
                    Failure::email_taken,
                ),
                None => Failure::duplicate_record(),
            }
        }
        ConstraintKind::NotNull => Failure::required_field(
            violation
                .column()
                .or(violation.target.as_deref())
                .unwrap_or("unknown"),
        ),
        ConstraintKind::ForeignKey | ConstraintKind::Check => Failure::constraint_violation(),
    }
}

/// Response for a panic caught by the error boundary.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "non-string panic payload".to_string());
    ApiError::Unexpected(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}

/// Wrap error responses produced outside our handlers (unmatched methods,
/// missing extensions, ...) in the envelope, keeping their status.
pub async fn envelope_bare_errors(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }

    let (parts, _) = response.into_parts();
    let mut enveloped =
        ApiError::http(status, status.canonical_reason().unwrap_or("Error")).into_response();
    // Keep framework headers such as `Allow` on a 405.
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            enveloped.headers_mut().append(name.clone(), value.clone());
        }
    }
    enveloped
}

/// Router fallback for unknown paths.
pub async fn not_found_fallback() -> ApiError {
    ApiError::not_found("Not Found")
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::Value;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    use super::*;

    #[derive(Clone, Default)]
    struct CapturedLevels(Arc<Mutex<Vec<Level>>>);

    impl<S: Subscriber> Layer<S> for CapturedLevels {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            self.0.lock().unwrap().push(*event.metadata().level());
        }
    }

    fn dispatch_capturing(err: ApiError) -> (Dispatched, Vec<Level>) {
        let captured = CapturedLevels::default();
        let subscriber = tracing_subscriber::registry().with(captured.clone());
        let out = tracing::subscriber::with_default(subscriber, || dispatch(err));
        let levels = captured.0.lock().unwrap().clone();
        (out, levels)
    }

    fn body(d: &Dispatched) -> Value {
        serde_json::to_value(&d.envelope).unwrap()
    }

    fn violation(kind: ConstraintKind, target: Option<&str>, attempted: Option<&str>) -> ApiError {
        ApiError::Persistence(PersistenceError::Constraint {
            operation: "create_user",
            violation: ConstraintViolation {
                kind,
                target: target.map(str::to_string),
                attempted: attempted.map(str::to_string),
                detail: "raw driver text users.hashed_password".to_string(),
            },
        })
    }

    #[test]
    fn typed_failure_is_used_as_is_without_logging() {
        let (out, logs) = dispatch_capturing(Failure::username_taken("bob").into());
        assert_eq!(out.status, StatusCode::CONFLICT);
        let body = body(&out);
        assert_eq!(body["error"], true);
        assert_eq!(body["error_code"], "USERNAME_ALREADY_EXISTS");
        assert_eq!(body["status_code"], 409);
        assert_eq!(body["context"]["username"], "bob");
        assert!(logs.is_empty());
    }

    #[test]
    fn typed_server_fault_is_logged_once() {
        let (out, logs) = dispatch_capturing(Failure::database_operation("create_user").into());
        assert_eq!(out.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(logs, [Level::ERROR]);
    }

    #[test]
    fn known_unique_targets_map_to_specific_kinds() {
        let (out, logs) =
            dispatch_capturing(violation(ConstraintKind::Unique, Some("users.username"), Some("bob")));
        assert_eq!(out.status, StatusCode::CONFLICT);
        assert_eq!(body(&out)["error_code"], "USERNAME_ALREADY_EXISTS");
        assert_eq!(body(&out)["context"]["username"], "bob");
        assert!(logs.is_empty());

        let (out, _) = dispatch_capturing(violation(
            ConstraintKind::Unique,
            Some("users_email_key"),
            Some("bob@example.com"),
        ));
        assert_eq!(out.status, StatusCode::CONFLICT);
        assert_eq!(body(&out)["error_code"], "EMAIL_ALREADY_EXISTS");
        assert_eq!(body(&out)["context"]["email"], "bob@example.com");
    }

    #[test]
    fn known_target_without_attempted_value_omits_context() {
        let (out, _) = dispatch_capturing(violation(ConstraintKind::Unique, Some("users.email"), None));
        assert_eq!(body(&out)["error_code"], "EMAIL_ALREADY_EXISTS");
        assert!(body(&out).get("context").is_none());
    }

    #[test]
    fn unknown_unique_target_is_a_logged_duplicate_record() {
        let (out, logs) =
            dispatch_capturing(violation(ConstraintKind::Unique, Some("todos.title"), None));
        assert_eq!(out.status, StatusCode::CONFLICT);
        assert_eq!(body(&out)["error_code"], "DUPLICATE_RECORD");
        assert_eq!(logs, [Level::WARN]);
        assert!(!body(&out).to_string().contains("raw driver text"));
    }

    #[test]
    fn not_null_maps_to_required_field() {
        let (out, logs) =
            dispatch_capturing(violation(ConstraintKind::NotNull, Some("users.email"), None));
        assert_eq!(out.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body(&out)["error_code"], "REQUIRED_FIELD_MISSING");
        assert_eq!(body(&out)["context"]["field"], "email");
        assert!(logs.is_empty());
    }

    #[test]
    fn other_constraints_are_generic_conflicts() {
        for kind in [ConstraintKind::ForeignKey, ConstraintKind::Check] {
            let (out, logs) = dispatch_capturing(violation(kind, None, None));
            assert_eq!(out.status, StatusCode::CONFLICT);
            assert_eq!(body(&out)["error_code"], "CONSTRAINT_VIOLATION");
            assert_eq!(logs, [Level::WARN]);
        }
    }

    #[test]
    fn operational_database_error_is_logged_and_generic() {
        let err = PersistenceError::from_sqlx("list_users", sqlx::Error::PoolClosed);
        let (out, logs) = dispatch_capturing(err.into());
        assert_eq!(out.status, StatusCode::INTERNAL_SERVER_ERROR);
        let body = body(&out);
        assert_eq!(body["error_code"], "DATABASE_OPERATION_FAILED");
        assert_eq!(body["context"]["operation"], "list_users");
        assert!(!body.to_string().to_lowercase().contains("pool"));
        assert_eq!(logs, [Level::ERROR]);
    }

    #[test]
    fn http_errors_pass_through() {
        let (out, logs) = dispatch_capturing(ApiError::not_found("Todo item not found"));
        assert_eq!(out.status, StatusCode::NOT_FOUND);
        let body = body(&out);
        assert_eq!(body["error_code"], "HTTP_EXCEPTION");
        assert_eq!(body["message"], "Todo item not found");
        assert_eq!(body["status_code"], 404);
        assert!(logs.is_empty());
    }

    #[test]
    fn unclassified_failure_is_internal_logged_once_and_opaque() {
        let err = anyhow::anyhow!("called `Option::unwrap()` on a `None` value");
        let (out, logs) = dispatch_capturing(err.into());
        assert_eq!(out.status, StatusCode::INTERNAL_SERVER_ERROR);
        let body = body(&out);
        assert_eq!(body["error_code"], "INTERNAL_SERVER_ERROR");
        assert_eq!(body["message"], "An unexpected error occurred");
        assert!(!body.to_string().contains("unwrap"));
        assert_eq!(logs, [Level::ERROR]);
    }

    #[test]
    fn dispatching_the_same_failure_twice_is_byte_identical() {
        let failure = Failure::validation("priority", "must be between 1 and 5");
        let a = serde_json::to_vec(&dispatch(failure.clone().into()).envelope).unwrap();
        let b = serde_json::to_vec(&dispatch(failure.into()).envelope).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn token_errors_become_authentication_failures() {
        let err = tasklane_auth::TokenValidationError::Expired;
        let (out, logs) = dispatch_capturing(AuthError::from(err).into());
        assert_eq!(out.status, StatusCode::UNAUTHORIZED);
        assert_eq!(body(&out)["message"], INVALID_TOKEN_MESSAGE);
        assert!(logs.is_empty());
    }

    #[tokio::test]
    async fn bare_error_keeps_framework_headers() {
        let bare = Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .header(header::ALLOW, "GET,HEAD")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(axum::body::Body::empty())
            .unwrap();

        let wrapped = envelope_bare_errors(bare).await;
        assert_eq!(wrapped.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(wrapped.headers()[header::ALLOW], "GET,HEAD");
        assert_eq!(
            wrapped.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        assert_eq!(wrapped.headers().get_all(header::CONTENT_TYPE).iter().count(), 1);
    }

    #[test]
    fn panic_payload_is_not_exposed() {
        let response = panic_response(Box::new("secret internal state".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
