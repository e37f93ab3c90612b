//! User accounts.

use sqlx::FromRow;

use tasklane_core::UserId;

use crate::db::{finish, Database, Tx};
use crate::error::PersistenceError;

const USER_COLUMNS: &str =
    "id, email, username, first_name, last_name, hashed_password, is_active, role";

/// A stored user row.
///
/// Carries the password hash, so it is never serialized directly.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    #[sqlx(try_from = "i64")]
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub hashed_password: String,
    pub role: String,
}

impl Database {
    /// Insert a user.
    ///
    /// Uniqueness of `username` and `email` is enforced by the schema; a
    /// violation comes back as [`PersistenceError::Constraint`] with the
    /// attempted value attached.
    pub async fn create_user(&self, new: &NewUser) -> Result<User, PersistenceError> {
        const OP: &str = "create_user";
        let mut tx = self.begin(OP).await?;
        let result = insert_user(&mut tx, new).await.map_err(|e| {
            PersistenceError::from_sqlx(OP, e)
                .with_attempted("username", &new.username)
                .with_attempted("email", &new.email)
        });
        finish(tx, OP, result).await
    }

    pub async fn find_user(&self, id: UserId) -> Result<Option<User>, PersistenceError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id.get())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| PersistenceError::from_sqlx("find_user", e))
    }

    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, PersistenceError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| PersistenceError::from_sqlx("find_user_by_username", e))
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool, PersistenceError> {
        self.exists("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)", username)
            .await
            .map_err(|e| PersistenceError::from_sqlx("username_exists", e))
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, PersistenceError> {
        self.exists("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)", email)
            .await
            .map_err(|e| PersistenceError::from_sqlx("email_exists", e))
    }

    pub async fn list_users(&self) -> Result<Vec<User>, PersistenceError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(self.pool())
            .await
            .map_err(|e| PersistenceError::from_sqlx("list_users", e))
    }

    /// Returns `false` if no such user exists.
    pub async fn update_password(
        &self,
        id: UserId,
        hashed_password: &str,
    ) -> Result<bool, PersistenceError> {
        const OP: &str = "update_password";
        let mut tx = self.begin(OP).await?;
        let result = sqlx::query("UPDATE users SET hashed_password = ? WHERE id = ?")
            .bind(hashed_password)
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map(|done| done.rows_affected() == 1)
            .map_err(|e| PersistenceError::from_sqlx(OP, e));
        finish(tx, OP, result).await
    }

    async fn exists(&self, sql: &'static str, value: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(sql)
            .bind(value)
            .fetch_one(self.pool())
            .await
    }
}

async fn insert_user(tx: &mut Tx, new: &NewUser) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (email, username, first_name, last_name, hashed_password, is_active, role)
        VALUES (?, ?, ?, ?, ?, 1, ?)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(&new.email)
    .bind(&new.username)
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(&new.hashed_password)
    .bind(&new.role)
    .fetch_one(&mut **tx)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConstraintKind;

    async fn memory_db() -> Database {
        Database::connect("sqlite::memory:", 1).await.unwrap()
    }

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            hashed_password: "$2b$04$notarealhash".to_string(),
            role: "user".to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_find_user() {
        let db = memory_db().await;
        let created = db.create_user(&new_user("alice", "alice@example.com")).await.unwrap();
        assert!(created.is_active);

        let found = db.find_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found, created);
        assert!(db.username_exists("alice").await.unwrap());
        assert!(db.email_exists("alice@example.com").await.unwrap());
        assert!(!db.email_exists("nobody@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_username_is_a_unique_violation_with_attempted_value() {
        let db = memory_db().await;
        db.create_user(&new_user("bob", "bob@example.com")).await.unwrap();

        let err = db
            .create_user(&new_user("bob", "other@example.com"))
            .await
            .unwrap_err();
        let violation = err.constraint().expect("constraint violation");
        assert_eq!(violation.kind, ConstraintKind::Unique);
        assert_eq!(violation.target.as_deref(), Some("users.username"));
        assert_eq!(violation.attempted.as_deref(), Some("bob"));
        assert_eq!(err.operation(), "create_user");
    }

    #[tokio::test]
    async fn failed_insert_leaves_connection_clean() {
        let db = memory_db().await;
        db.create_user(&new_user("carol", "carol@example.com")).await.unwrap();
        db.create_user(&new_user("carol", "carol2@example.com"))
            .await
            .unwrap_err();

        // Single-connection pool: a leaked transaction would still be open here.
        db.create_user(&new_user("dave", "dave@example.com")).await.unwrap();
        let users = db.list_users().await.unwrap();
        let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["carol", "dave"]);
    }

    #[tokio::test]
    async fn update_password_reports_missing_user() {
        let db = memory_db().await;
        let user = db.create_user(&new_user("erin", "erin@example.com")).await.unwrap();
        assert!(db.update_password(user.id, "$2b$04$other").await.unwrap());
        assert!(!db.update_password(UserId::new(999), "$2b$04$other").await.unwrap());
    }
}
