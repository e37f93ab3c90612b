//! Infrastructure layer: SQLite persistence for users and todos.
//!
//! Store methods return [`PersistenceError`], which keeps constraint
//! violations distinguishable from operational failures so the API boundary
//! can classify them without looking at driver text.

pub mod db;
pub mod error;
pub mod todos;
pub mod users;

pub use db::Database;
pub use error::{ConstraintKind, ConstraintViolation, PersistenceError};
pub use todos::{NewTodo, Todo};
pub use users::{NewUser, User};
