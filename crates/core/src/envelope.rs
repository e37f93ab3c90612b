//! Wire shape of every error response.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, Failure, FailureContext, HTTP_PASSTHROUGH_CODE};

/// `{error: true, message, error_code, status_code, context?}`.
///
/// `context` is omitted from the serialized form when empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub error: bool,
    pub message: String,
    pub error_code: String,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "FailureContext::is_empty")]
    pub context: FailureContext,
}

impl ResponseEnvelope {
    /// Render a kind with its default message template.
    pub fn render(kind: ErrorKind, context: FailureContext) -> Self {
        Self::from_failure(&Failure::new(kind, context))
    }

    pub fn from_failure(failure: &Failure) -> Self {
        Self {
            error: true,
            message: failure.message().to_string(),
            error_code: failure.kind().error_code().to_string(),
            status_code: failure.status_code(),
            context: failure.context().clone(),
        }
    }

    /// Wrap a framework-level HTTP error without reclassifying it.
    pub fn passthrough(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            error_code: HTTP_PASSTHROUGH_CODE.to_string(),
            status_code,
            context: FailureContext::new(),
        }
    }
}

impl From<&Failure> for ResponseEnvelope {
    fn from(value: &Failure) -> Self {
        Self::from_failure(value)
    }
}
