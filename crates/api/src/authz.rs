//! Role guards for handlers.

use tasklane_auth::{authorize, AuthzError, Principal, Role};
use tasklane_core::Failure;

use crate::app::errors::ApiError;

pub const ADMIN_REQUIRED_MESSAGE: &str = "Admin access required";

impl From<AuthzError> for ApiError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Forbidden { required: Role::Admin } => {
                Failure::authorization_denied(ADMIN_REQUIRED_MESSAGE).into()
            }
            AuthzError::Forbidden { required } => {
                Failure::authorization_denied(format!("Role '{required}' required")).into()
            }
        }
    }
}

/// Reject callers that are not administrators.
pub fn require_admin(principal: &Principal) -> Result<(), ApiError> {
    authorize(principal, Role::Admin)?;
    Ok(())
}
