use serde::{Deserialize, Serialize};

use tasklane_auth::Role;
use tasklane_core::{Failure, UserId};
use tasklane_infra::{NewTodo, User};

// -------------------------
// Request DTOs
// -------------------------

/// Registration body. Every field is optional at the wire level so that a
/// missing one is reported by name instead of as a deserialization error.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// A registration that passed validation.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: Role,
}

pub const MIN_PASSWORD_LEN: usize = 6;

impl RegisterRequest {
    pub fn validate(self) -> Result<Registration, Failure> {
        let username = required("username", self.username)?;
        let email = required("email", self.email)?;
        let first_name = required("first_name", self.first_name)?;
        let last_name = required("last_name", self.last_name)?;
        let password = required("password", self.password)?;
        let role = required("role", self.role)?;

        if !email.contains('@') {
            return Err(Failure::validation("email", "must be a valid email address"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Failure::validation(
                "password",
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        let role = role
            .parse::<Role>()
            .map_err(|_| Failure::validation("role", "must be one of: user, admin"))?;

        Ok(Registration {
            username,
            email,
            first_name,
            last_name,
            password,
            role,
        })
    }
}

/// OAuth2 password-grant style form.
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TodoRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub priority: Option<i64>,
    #[serde(default)]
    pub completed: bool,
}

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;

impl TodoRequest {
    pub fn validate(self) -> Result<NewTodo, Failure> {
        let title = required("title", self.title)?;
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(Failure::validation(
                "title",
                format!("must be at most {MAX_TITLE_LEN} characters"),
            ));
        }
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(Failure::validation(
                    "description",
                    format!("must be at most {MAX_DESCRIPTION_LEN} characters"),
                ));
            }
        }
        let priority = self
            .priority
            .ok_or_else(|| Failure::required_field("priority"))?;
        if !(1..=5).contains(&priority) {
            return Err(Failure::validation("priority", "must be between 1 and 5"));
        }

        Ok(NewTodo {
            title,
            description: self.description,
            priority,
            completed: self.completed,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub password: Option<String>,
    pub new_password: Option<String>,
}

impl ChangePasswordRequest {
    /// Returns `(current, new)`.
    pub fn validate(self) -> Result<(String, String), Failure> {
        let current = required("password", self.password)?;
        let new = required("new_password", self.new_password)?;
        if new.chars().count() < MIN_PASSWORD_LEN {
            return Err(Failure::validation(
                "new_password",
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        Ok((current, new))
    }
}

// -------------------------
// Response DTOs
// -------------------------

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub is_active: bool,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            role: u.role,
            is_active: u.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer",
        }
    }
}

// -------------------------
// Helpers
// -------------------------

/// A present, non-blank value or a required-field failure naming `field`.
pub fn required(field: &str, value: Option<String>) -> Result<String, Failure> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Failure::required_field(field)),
    }
}

#[cfg(test)]
mod tests {
    use tasklane_core::ErrorKind;

    use super::*;

    fn full_registration() -> RegisterRequest {
        RegisterRequest {
            username: Some("alice".into()),
            email: Some("alice@example.com".into()),
            first_name: Some("Alice".into()),
            last_name: Some("Liddell".into()),
            password: Some("wonderland".into()),
            role: Some("user".into()),
        }
    }

    #[test]
    fn missing_email_names_the_field() {
        let req = RegisterRequest {
            email: None,
            ..full_registration()
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequiredFieldMissing);
        assert_eq!(err.context()["field"], "email");
    }

    #[test]
    fn blank_values_count_as_missing() {
        let req = RegisterRequest {
            username: Some("   ".into()),
            ..full_registration()
        };
        assert_eq!(req.validate().unwrap_err().context()["field"], "username");
    }

    #[test]
    fn short_password_and_unknown_role_are_validation_errors() {
        let req = RegisterRequest {
            password: Some("abc".into()),
            ..full_registration()
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(err.context()["field"], "password");

        let req = RegisterRequest {
            role: Some("root".into()),
            ..full_registration()
        };
        assert_eq!(req.validate().unwrap_err().context()["field"], "role");
    }

    #[test]
    fn valid_registration_parses_role() {
        let reg = full_registration().validate().unwrap();
        assert_eq!(reg.role, Role::User);
    }

    #[test]
    fn todo_priority_bounds() {
        let todo = |priority| TodoRequest {
            title: Some("t".into()),
            description: None,
            priority,
            completed: false,
        };
        assert_eq!(todo(Some(1)).validate().unwrap().priority, 1);
        assert_eq!(todo(Some(5)).validate().unwrap().priority, 5);
        assert_eq!(
            todo(Some(6)).validate().unwrap_err().kind(),
            ErrorKind::ValidationFailed
        );
        assert_eq!(
            todo(None).validate().unwrap_err().kind(),
            ErrorKind::RequiredFieldMissing
        );
    }

    #[test]
    fn overlong_title_is_rejected() {
        let req = TodoRequest {
            title: Some("x".repeat(MAX_TITLE_LEN + 1)),
            description: None,
            priority: Some(3),
            completed: false,
        };
        assert_eq!(req.validate().unwrap_err().context()["field"], "title");
    }

    #[test]
    fn user_response_has_no_hash() {
        let user = User {
            id: UserId::new(1),
            email: "a@b.c".into(),
            username: "a".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            hashed_password: "$2b$04$secret".into(),
            is_active: true,
            role: "user".into(),
        };
        let json = serde_json::to_string(&UserResponse::from(user)).unwrap();
        assert!(!json.contains("$2b$"));
        assert!(!json.contains("hashed_password"));
    }
}
