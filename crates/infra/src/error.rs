//! Persistence failures.
//!
//! SQLx errors are classified once, at the store boundary, so callers never
//! have to inspect driver error text.
//!
//! | SQLx error | `DatabaseError::kind()` | PersistenceError |
//! |------------|-------------------------|------------------|
//! | Database | `UniqueViolation` | `Constraint` (`ConstraintKind::Unique`) |
//! | Database | `NotNullViolation` | `Constraint` (`ConstraintKind::NotNull`) |
//! | Database | `ForeignKeyViolation` | `Constraint` (`ConstraintKind::ForeignKey`) |
//! | Database | `CheckViolation` | `Constraint` (`ConstraintKind::Check`) |
//! | Database | other | `Database` |
//! | PoolClosed, Io, Tls, ... | n/a | `Database` |
//!
//! The violated constraint is identified by its name when the driver reports
//! one (Postgres), otherwise by the `table.column` target parsed from the
//! message (SQLite: `UNIQUE constraint failed: users.username`).

use sqlx::error::{DatabaseError, ErrorKind as SqlxErrorKind};
use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    NotNull,
    ForeignKey,
    Check,
}

impl core::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ConstraintKind::Unique => "unique",
            ConstraintKind::NotNull => "not-null",
            ConstraintKind::ForeignKey => "foreign-key",
            ConstraintKind::Check => "check",
        })
    }
}

/// A write rejected by a schema constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} constraint violated on {}: {detail}", .target.as_deref().unwrap_or("<unknown>"))]
pub struct ConstraintViolation {
    pub kind: ConstraintKind,
    /// Constraint name, or `table.column`.
    pub target: Option<String>,
    /// Value that was being written to the violated column, when the store
    /// knows it and it is not sensitive.
    pub attempted: Option<String>,
    /// Raw driver message. Server-side diagnostics only.
    pub detail: String,
}

impl ConstraintViolation {
    /// `None` if `err` is not a constraint violation.
    pub fn from_database_error(err: &dyn DatabaseError) -> Option<Self> {
        let kind = match err.kind() {
            SqlxErrorKind::UniqueViolation => ConstraintKind::Unique,
            SqlxErrorKind::NotNullViolation => ConstraintKind::NotNull,
            SqlxErrorKind::ForeignKeyViolation => ConstraintKind::ForeignKey,
            SqlxErrorKind::CheckViolation => ConstraintKind::Check,
            _ => return None,
        };

        let target = err
            .constraint()
            .map(str::to_string)
            .or_else(|| parse_target(err.message()));

        Some(Self {
            kind,
            target,
            attempted: None,
            detail: err.message().to_string(),
        })
    }

    /// Table part of a `table.column` target.
    pub fn table(&self) -> Option<&str> {
        self.target
            .as_deref()
            .and_then(|t| t.split_once('.'))
            .map(|(table, _)| table)
    }

    /// Column part of a `table.column` target.
    pub fn column(&self) -> Option<&str> {
        self.target
            .as_deref()
            .and_then(|t| t.split_once('.'))
            .map(|(_, column)| column)
    }
}

/// `"UNIQUE constraint failed: users.email, users.x"` -> `"users.email"`.
fn parse_target(message: &str) -> Option<String> {
    let (_, rest) = message.split_once("constraint failed: ")?;
    let first = rest.split(',').next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The write was rejected by a schema constraint.
    #[error("{operation}: {violation}")]
    Constraint {
        operation: &'static str,
        violation: ConstraintViolation,
    },

    /// Operational or programming failure (connection, syntax, decode, ...).
    #[error("{operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl PersistenceError {
    /// Classify a SQLx error raised while performing `operation`.
    pub fn from_sqlx(operation: &'static str, err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(violation) = ConstraintViolation::from_database_error(&**db_err) {
                return PersistenceError::Constraint {
                    operation,
                    violation,
                };
            }
        }
        PersistenceError::Database {
            operation,
            source: err,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            PersistenceError::Constraint { operation, .. } => operation,
            PersistenceError::Database { operation, .. } => operation,
        }
    }

    pub fn constraint(&self) -> Option<&ConstraintViolation> {
        match self {
            PersistenceError::Constraint { violation, .. } => Some(violation),
            PersistenceError::Database { .. } => None,
        }
    }

    /// Record the value written to `column` if that is the violated column.
    pub fn with_attempted(mut self, column: &str, value: &str) -> Self {
        if let PersistenceError::Constraint { violation, .. } = &mut self {
            if violation.attempted.is_none() && violation.column() == Some(column) {
                violation.attempted = Some(value.to_string());
            }
        }
        self
    }
}
