//! Todo items, always scoped to their owner.

use serde::Serialize;
use sqlx::FromRow;

use tasklane_core::{TodoId, UserId};

use crate::db::{finish, Database, Tx};
use crate::error::PersistenceError;

const TODO_COLUMNS: &str = "id, title, description, priority, completed, owner_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Todo {
    #[sqlx(try_from = "i64")]
    pub id: TodoId,
    pub title: String,
    pub description: Option<String>,
    pub priority: i64,
    pub completed: bool,
    #[sqlx(try_from = "i64")]
    pub owner_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
    pub priority: i64,
    pub completed: bool,
}

impl Database {
    pub async fn list_todos_for(&self, owner: UserId) -> Result<Vec<Todo>, PersistenceError> {
        sqlx::query_as::<_, Todo>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE owner_id = ? ORDER BY id"
        ))
        .bind(owner.get())
        .fetch_all(self.pool())
        .await
        .map_err(|e| PersistenceError::from_sqlx("list_todos", e))
    }

    pub async fn list_all_todos(&self) -> Result<Vec<Todo>, PersistenceError> {
        sqlx::query_as::<_, Todo>(&format!("SELECT {TODO_COLUMNS} FROM todos ORDER BY id"))
            .fetch_all(self.pool())
            .await
            .map_err(|e| PersistenceError::from_sqlx("list_all_todos", e))
    }

    pub async fn get_todo(
        &self,
        owner: UserId,
        id: TodoId,
    ) -> Result<Option<Todo>, PersistenceError> {
        sqlx::query_as::<_, Todo>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE id = ? AND owner_id = ?"
        ))
        .bind(id.get())
        .bind(owner.get())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| PersistenceError::from_sqlx("get_todo", e))
    }

    pub async fn create_todo(&self, owner: UserId, new: &NewTodo) -> Result<Todo, PersistenceError> {
        const OP: &str = "create_todo";
        let mut tx = self.begin(OP).await?;
        let result = insert_todo(&mut tx, owner, new)
            .await
            .map_err(|e| PersistenceError::from_sqlx(OP, e));
        finish(tx, OP, result).await
    }

    /// Insert all of `items` or none of them.
    pub async fn create_todos(
        &self,
        owner: UserId,
        items: &[NewTodo],
    ) -> Result<Vec<Todo>, PersistenceError> {
        const OP: &str = "create_todos";
        let mut tx = self.begin(OP).await?;
        let result = insert_all(&mut tx, owner, items)
            .await
            .map_err(|e| PersistenceError::from_sqlx(OP, e));
        finish(tx, OP, result).await
    }

    /// `None` if the todo does not exist or belongs to someone else.
    pub async fn update_todo(
        &self,
        owner: UserId,
        id: TodoId,
        changes: &NewTodo,
    ) -> Result<Option<Todo>, PersistenceError> {
        const OP: &str = "update_todo";
        let mut tx = self.begin(OP).await?;
        let result = sqlx::query_as::<_, Todo>(&format!(
            r#"
            UPDATE todos
            SET title = ?, description = ?, priority = ?, completed = ?
            WHERE id = ? AND owner_id = ?
            RETURNING {TODO_COLUMNS}
            "#
        ))
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(changes.priority)
        .bind(changes.completed)
        .bind(id.get())
        .bind(owner.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| PersistenceError::from_sqlx(OP, e));
        finish(tx, OP, result).await
    }

    /// `false` if the todo does not exist or belongs to someone else.
    pub async fn delete_todo(&self, owner: UserId, id: TodoId) -> Result<bool, PersistenceError> {
        const OP: &str = "delete_todo";
        let mut tx = self.begin(OP).await?;
        let result = sqlx::query("DELETE FROM todos WHERE id = ? AND owner_id = ?")
            .bind(id.get())
            .bind(owner.get())
            .execute(&mut *tx)
            .await
            .map(|done| done.rows_affected() == 1)
            .map_err(|e| PersistenceError::from_sqlx(OP, e));
        finish(tx, OP, result).await
    }
}

async fn insert_todo(tx: &mut Tx, owner: UserId, new: &NewTodo) -> Result<Todo, sqlx::Error> {
    sqlx::query_as::<_, Todo>(&format!(
        r#"
        INSERT INTO todos (title, description, priority, completed, owner_id)
        VALUES (?, ?, ?, ?, ?)
        RETURNING {TODO_COLUMNS}
        "#
    ))
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.priority)
    .bind(new.completed)
    .bind(owner.get())
    .fetch_one(&mut **tx)
    .await
}

async fn insert_all(tx: &mut Tx, owner: UserId, items: &[NewTodo]) -> Result<Vec<Todo>, sqlx::Error> {
    let mut created = Vec::with_capacity(items.len());
    for item in items {
        created.push(insert_todo(tx, owner, item).await?);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConstraintKind;
    use crate::users::NewUser;

    async fn db_with_owner() -> (Database, UserId) {
        let db = Database::connect("sqlite::memory:", 1).await.unwrap();
        let owner = db
            .create_user(&NewUser {
                email: "owner@example.com".to_string(),
                username: "owner".to_string(),
                first_name: "O".to_string(),
                last_name: "W".to_string(),
                hashed_password: "$2b$04$notarealhash".to_string(),
                role: "user".to_string(),
            })
            .await
            .unwrap();
        (db, owner.id)
    }

    fn todo(title: &str, priority: i64) -> NewTodo {
        NewTodo {
            title: title.to_string(),
            description: None,
            priority,
            completed: false,
        }
    }

    #[tokio::test]
    async fn crud_is_scoped_to_owner() {
        let (db, owner) = db_with_owner().await;
        let created = db.create_todo(owner, &todo("write tests", 3)).await.unwrap();
        assert_eq!(created.owner_id, owner);

        let stranger = UserId::new(owner.get() + 100);
        assert_eq!(db.get_todo(stranger, created.id).await.unwrap(), None);
        assert!(!db.delete_todo(stranger, created.id).await.unwrap());

        let mut changes = todo("write more tests", 4);
        changes.completed = true;
        let updated = db.update_todo(owner, created.id, &changes).await.unwrap().unwrap();
        assert!(updated.completed);
        assert_eq!(updated.priority, 4);

        assert!(db.delete_todo(owner, created.id).await.unwrap());
        assert!(db.list_todos_for(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_batch_rolls_back_earlier_inserts() {
        let (db, owner) = db_with_owner().await;
        let batch = [todo("one", 1), todo("two", 2), todo("out of range", 9)];

        let err = db.create_todos(owner, &batch).await.unwrap_err();
        let violation = err.constraint().expect("constraint violation");
        assert_eq!(violation.kind, ConstraintKind::Check);
        assert_eq!(err.operation(), "create_todos");

        // Same connection (pool of one): nothing from the failed batch is visible
        // and the connection accepts new work.
        assert!(db.list_all_todos().await.unwrap().is_empty());
        let ok = db.create_todos(owner, &batch[..2]).await.unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(db.list_todos_for(owner).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_owner_is_a_foreign_key_violation() {
        let (db, owner) = db_with_owner().await;
        let err = db
            .create_todo(UserId::new(owner.get() + 1), &todo("orphan", 1))
            .await
            .unwrap_err();
        assert_eq!(err.constraint().unwrap().kind, ConstraintKind::ForeignKey);
    }
}
