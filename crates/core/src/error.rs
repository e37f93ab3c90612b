//! Failure taxonomy.
//!
//! Every classified failure in the service is an [`ErrorKind`] bound to a
//! request-specific [`FailureContext`]. Kinds are process-wide constants; a
//! [`Failure`] is created where the condition is detected and consumed once at
//! the request boundary.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use thiserror::Error;

/// Context attached to a failure at raise time.
///
/// Keys are kept sorted so the same failure always renders to the same bytes.
pub type FailureContext = BTreeMap<String, JsonValue>;

/// Envelope code for framework-level HTTP errors passed through unchanged.
///
/// Reserved: no [`ErrorKind`] may use it.
pub const HTTP_PASSTHROUGH_CODE: &str = "HTTP_EXCEPTION";

/// Closed set of failure classes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Registration attempted with a username that is already taken.
    UsernameAlreadyExists,
    /// Registration attempted with an email that is already taken.
    EmailAlreadyExists,
    /// A user already exists for some identifying field.
    UserAlreadyExists,
    /// Uniqueness violation on a target we do not model explicitly.
    DuplicateRecord,
    /// Foreign-key, check, or otherwise unclassified constraint violation.
    ConstraintViolation,
    /// A required field was absent (or null).
    RequiredFieldMissing,
    /// A field was present but failed validation.
    ValidationFailed,
    /// Credentials or token could not be verified.
    AuthenticationFailed,
    /// The caller is authenticated but not allowed to do this.
    AuthorizationDenied,
    /// A persistence operation failed for a non-constraint reason.
    DatabaseOperationFailed,
    /// Anything unclassified.
    Internal,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 11] = [
        ErrorKind::UsernameAlreadyExists,
        ErrorKind::EmailAlreadyExists,
        ErrorKind::UserAlreadyExists,
        ErrorKind::DuplicateRecord,
        ErrorKind::ConstraintViolation,
        ErrorKind::RequiredFieldMissing,
        ErrorKind::ValidationFailed,
        ErrorKind::AuthenticationFailed,
        ErrorKind::AuthorizationDenied,
        ErrorKind::DatabaseOperationFailed,
        ErrorKind::Internal,
    ];

    /// Fixed HTTP status for this kind.
    pub const fn status_code(self) -> u16 {
        match self {
            ErrorKind::UsernameAlreadyExists
            | ErrorKind::EmailAlreadyExists
            | ErrorKind::UserAlreadyExists
            | ErrorKind::DuplicateRecord
            | ErrorKind::ConstraintViolation => 409,
            ErrorKind::RequiredFieldMissing | ErrorKind::ValidationFailed => 422,
            ErrorKind::AuthenticationFailed => 401,
            ErrorKind::AuthorizationDenied => 403,
            ErrorKind::DatabaseOperationFailed | ErrorKind::Internal => 500,
        }
    }

    /// Stable machine-readable code.
    pub const fn error_code(self) -> &'static str {
        match self {
            ErrorKind::UsernameAlreadyExists => "USERNAME_ALREADY_EXISTS",
            ErrorKind::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            ErrorKind::UserAlreadyExists => "USER_ALREADY_EXISTS",
            ErrorKind::DuplicateRecord => "DUPLICATE_RECORD",
            ErrorKind::ConstraintViolation => "CONSTRAINT_VIOLATION",
            ErrorKind::RequiredFieldMissing => "REQUIRED_FIELD_MISSING",
            ErrorKind::ValidationFailed => "VALIDATION_ERROR",
            ErrorKind::AuthenticationFailed => "AUTHENTICATION_FAILED",
            ErrorKind::AuthorizationDenied => "AUTHORIZATION_FAILED",
            ErrorKind::DatabaseOperationFailed => "DATABASE_OPERATION_FAILED",
            ErrorKind::Internal => "INTERNAL_SERVER_ERROR",
        }
    }

    /// `true` for 5xx kinds: conditions the client cannot have caused.
    pub const fn is_server_fault(self) -> bool {
        self.status_code() >= 500
    }

    /// Render the message template with the given context.
    ///
    /// Missing template keys render as `unknown`.
    pub fn render_message(self, context: &FailureContext) -> String {
        match self {
            ErrorKind::UsernameAlreadyExists => {
                "A user with this username already exists".to_string()
            }
            ErrorKind::EmailAlreadyExists => "A user with this email already exists".to_string(),
            ErrorKind::UserAlreadyExists => {
                format!("A user with this {} already exists", lookup(context, "field"))
            }
            ErrorKind::DuplicateRecord => "A record with these details already exists".to_string(),
            ErrorKind::ConstraintViolation => "Database constraint violation".to_string(),
            ErrorKind::RequiredFieldMissing => format!(
                "Field '{}' is required and cannot be null",
                lookup(context, "field")
            ),
            ErrorKind::ValidationFailed => format!(
                "Validation error for field '{}': {}",
                lookup(context, "field"),
                lookup(context, "message")
            ),
            ErrorKind::AuthenticationFailed => "Authentication failed".to_string(),
            ErrorKind::AuthorizationDenied => "Access denied".to_string(),
            ErrorKind::DatabaseOperationFailed => format!(
                "Database operation '{}' failed",
                lookup(context, "operation")
            ),
            ErrorKind::Internal => "An unexpected error occurred".to_string(),
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.error_code())
    }
}

fn lookup<'a>(context: &'a FailureContext, key: &str) -> &'a str {
    context
        .get(key)
        .and_then(JsonValue::as_str)
        .unwrap_or("unknown")
}

/// One occurrence of an [`ErrorKind`] with bound context.
///
/// The message is rendered when the failure is constructed. Construction never
/// fails and never logs; logging happens once, at dispatch.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct Failure {
    kind: ErrorKind,
    message: String,
    context: FailureContext,
}

impl Failure {
    /// Bind `context` to `kind`, rendering the kind's message template.
    pub fn new(kind: ErrorKind, context: FailureContext) -> Self {
        let message = kind.render_message(&context);
        Self {
            kind,
            message,
            context,
        }
    }

    /// A failure with no context.
    pub fn bare(kind: ErrorKind) -> Self {
        Self::new(kind, FailureContext::new())
    }

    fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: FailureContext::new(),
        }
    }

    pub fn username_taken(username: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::UsernameAlreadyExists,
            context([("username", username.into())]),
        )
    }

    pub fn email_taken(email: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::EmailAlreadyExists,
            context([("email", email.into())]),
        )
    }

    pub fn user_exists(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::UserAlreadyExists,
            context([("field", field.into()), ("value", value.into())]),
        )
    }

    pub fn duplicate_record() -> Self {
        Self::bare(ErrorKind::DuplicateRecord)
    }

    pub fn constraint_violation() -> Self {
        Self::bare(ErrorKind::ConstraintViolation)
    }

    pub fn required_field(field: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::RequiredFieldMissing,
            context([("field", field.into())]),
        )
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::ValidationFailed,
            context([("field", field.into()), ("message", message.into())]),
        )
    }

    /// Authentication failure with a client-safe reason.
    ///
    /// Never pass credential material as the reason.
    pub fn authentication_failed(reason: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::AuthenticationFailed, reason)
    }

    pub fn authorization_denied(reason: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::AuthorizationDenied, reason)
    }

    pub fn database_operation(operation: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::DatabaseOperationFailed,
            context([("operation", operation.into())]),
        )
    }

    pub fn internal() -> Self {
        Self::bare(ErrorKind::Internal)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &FailureContext {
        &self.context
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

fn context<const N: usize>(pairs: [(&str, String); N]) -> FailureContext {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), JsonValue::String(v)))
        .collect()
}
