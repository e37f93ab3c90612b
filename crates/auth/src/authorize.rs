use thiserror::Error;

use crate::{Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{required}' required")]
    Forbidden { required: Role },
}

/// Check that `principal` holds `required`.
///
/// Admins satisfy every role requirement. No IO, no panics.
pub fn authorize(principal: &Principal, required: Role) -> Result<(), AuthzError> {
    if principal.is_admin() || principal.role == required {
        Ok(())
    } else {
        Err(AuthzError::Forbidden { required })
    }
}

#[cfg(test)]
mod tests {
    use tasklane_core::UserId;

    use super::*;

    #[test]
    fn admin_satisfies_any_role() {
        let admin = Principal::new(UserId::new(1), "root", Role::Admin);
        assert!(authorize(&admin, Role::Admin).is_ok());
        assert!(authorize(&admin, Role::User).is_ok());
    }

    #[test]
    fn user_cannot_act_as_admin() {
        let user = Principal::new(UserId::new(2), "bob", Role::User);
        assert!(authorize(&user, Role::User).is_ok());
        assert_eq!(
            authorize(&user, Role::Admin),
            Err(AuthzError::Forbidden {
                required: Role::Admin
            })
        );
    }
}
