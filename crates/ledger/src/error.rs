//! The module contains the errors the ledger can return.
//!
//! Every failure is scoped to a single request. The variants map onto the
//! taxonomy the HTTP layer exposes:
//!
//! - [`NotFound`] no matching row, or the row belongs to another parent.
//! - [`EditConflict`] the version token supplied on update is stale.
//! - [`Overallocated`] shares would exceed the expense amount.
//! - [`Transient`] timeout or store unavailable, always safe to retry.
//!
//!  [`NotFound`]: LedgerError::NotFound
//!  [`EditConflict`]: LedgerError::EditConflict
//!  [`Overallocated`]: LedgerError::Overallocated
//!  [`Transient`]: LedgerError::Transient
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Ledger custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Edit conflict: {0}")]
    EditConflict(String),
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Overallocated: {0}")]
    Overallocated(String),
    #[error("Invalid input for `{field}`: {message}")]
    InvalidInput { field: String, message: String },
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Transient failure: {0}")]
    Transient(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl LedgerError {
    pub(crate) fn invalid_input(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Classifies a store error raised while writing `what`.
    ///
    /// Unique and foreign-key violations become domain errors, lost connections
    /// become [`LedgerError::Transient`], anything else stays a database error.
    pub(crate) fn from_store(err: DbErr, what: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                return Self::DuplicateEntry(format!("{what} already exists"));
            }
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                return Self::ForeignKeyViolation(format!("{what} references a missing row"));
            }
            _ => {}
        }
        match err {
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => Self::Transient(err.to_string()),
            other => Self::Database(other),
        }
    }

    /// Returns `true` when retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::EditConflict(a), Self::EditConflict(b)) => a == b,
            (Self::DuplicateEntry(a), Self::DuplicateEntry(b)) => a == b,
            (Self::ForeignKeyViolation(a), Self::ForeignKeyViolation(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::Overallocated(a), Self::Overallocated(b)) => a == b,
            (
                Self::InvalidInput {
                    field: fa,
                    message: ma,
                },
                Self::InvalidInput {
                    field: fb,
                    message: mb,
                },
            ) => fa == fb && ma == mb,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::InvalidState(a), Self::InvalidState(b)) => a == b,
            (Self::Transient(a), Self::Transient(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_db_errors_stay_database_errors() {
        let err = LedgerError::from_store(DbErr::Custom("boom".to_string()), "expense");
        assert!(matches!(err, LedgerError::Database(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn invalid_input_carries_the_field() {
        let err = LedgerError::invalid_input("sort", "unknown sort key");
        assert_eq!(
            err.to_string(),
            "Invalid input for `sort`: unknown sort key"
        );
    }
}
