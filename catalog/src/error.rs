//! Error handling.

use std::error::Error as StdError;

use anyhow::Error as AnyError;
use displaydoc::Display;
use sea_orm::{DbErr, SqlErr};

use quarry::error::QuarryError;
use quarry::hash::ContentHash;

pub type CatalogResult<T> = Result<T, CatalogError>;

/// The kind of catalog record an error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EntityKind {
    /// data set
    DataSet,

    /// data file
    DataFile,

    /// data version
    DataVersion,
}

/// An error.
#[derive(Debug, Display)]
pub enum CatalogError {
    /// The {kind} "{identifier}" does not exist.
    NotFound {
        kind: EntityKind,
        identifier: String,
    },

    /// A {kind} named "{name}" already exists.
    DuplicateName { kind: EntityKind, name: String },

    /// Cannot move {kind} from {from} to {to}.
    InvalidStatusTransition {
        kind: EntityKind,
        from: &'static str,
        to: &'static str,
    },

    /// The {kind} "{identifier}" still has live children.
    DeleteBlocked {
        kind: EntityKind,
        identifier: String,
    },

    /// Version {ordinal} of data file "{datafile_id}" was taken by a concurrent writer.
    OrdinalConflict { datafile_id: String, ordinal: i32 },

    /// Constraint violation: {0}
    ConstraintViolation(AnyError),

    /// Invalid argument: {0}
    InvalidArgument(String),

    /// Object {hash} does not exist in storage.
    NotFoundRemote { hash: ContentHash },

    /// Object {hash} failed its integrity check: {reason}
    IntegrityMismatch { hash: ContentHash, reason: String },

    /// Storage error: {0}
    StorageError(AnyError),

    /// The database is locked: {0}
    DatabaseBusy(AnyError),

    /// The catalog is busy. Gave up after {attempts} attempts.
    Busy { attempts: u32 },

    /// Database error: {0}
    DatabaseError(AnyError),

    /// Configuration error: {0}
    ConfigError(AnyError),

    /// Error from the common components.
    QuarryError(QuarryError),
}

impl CatalogError {
    /// Classifies an error from the database layer.
    ///
    /// Unique and foreign key violations become `ConstraintViolation` and
    /// lock contention becomes `DatabaseBusy`. Callers that know which
    /// constraint was hit may map these further.
    pub fn database_error(error: DbErr) -> Self {
        if matches!(
            error.sql_err(),
            Some(SqlErr::UniqueConstraintViolation(_) | SqlErr::ForeignKeyConstraintViolation(_))
        ) {
            return Self::ConstraintViolation(AnyError::new(error));
        }

        if is_lock_contention(&error) {
            return Self::DatabaseBusy(AnyError::new(error));
        }

        Self::DatabaseError(AnyError::new(error))
    }

    pub fn storage_error(error: impl StdError + Send + Sync + 'static) -> Self {
        Self::StorageError(AnyError::new(error))
    }

    pub fn config_error(error: AnyError) -> Self {
        Self::ConfigError(error)
    }

    pub fn not_found(kind: EntityKind, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            identifier: identifier.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns whether the operation may succeed if it is run again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DatabaseBusy(_) | Self::OrdinalConflict { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::DuplicateName { .. } => "DuplicateName",
            Self::InvalidStatusTransition { .. } => "InvalidStatusTransition",
            Self::DeleteBlocked { .. } => "DeleteBlocked",
            Self::OrdinalConflict { .. } => "OrdinalConflict",
            Self::ConstraintViolation(_) => "ConstraintViolation",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::NotFoundRemote { .. } => "NotFoundRemote",
            Self::IntegrityMismatch { .. } => "IntegrityMismatch",
            Self::StorageError(_) => "StorageError",
            Self::DatabaseBusy(_) => "DatabaseBusy",
            Self::Busy { .. } => "Busy",
            Self::DatabaseError(_) => "DatabaseError",
            Self::ConfigError(_) => "ConfigError",
            Self::QuarryError(e) => e.name(),
        }
    }
}

/// Returns whether a unique index rejected the statement.
pub(crate) fn is_unique_violation(error: &DbErr) -> bool {
    matches!(error.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn is_lock_contention(error: &DbErr) -> bool {
    // SQLITE_BUSY (5), SQLITE_LOCKED (6) and extended codes thereof, or
    // a PostgreSQL serialization failure.
    let message = error.to_string();
    [
        "database is locked",
        "database table is locked",
        "(code: 5)",
        "(code: 6)",
        "(code: 261)",
        "(code: 517)",
        "could not serialize access",
    ]
    .iter()
    .any(|pattern| message.contains(pattern))
}

impl StdError for CatalogError {}

impl From<QuarryError> for CatalogError {
    fn from(error: QuarryError) -> Self {
        match error {
            QuarryError::InvalidName { .. } | QuarryError::InvalidVersionOrdinal { .. } => {
                Self::InvalidArgument(error.to_string())
            }
            _ => Self::QuarryError(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use sea_orm::RuntimeErr;

    #[test]
    fn test_lock_contention_is_retryable() {
        let error = CatalogError::database_error(DbErr::Exec(RuntimeErr::Internal(
            "error returned from database: (code: 5) database is locked".to_owned(),
        )));

        assert!(matches!(error, CatalogError::DatabaseBusy(_)));
        assert!(error.is_retryable());
    }

    #[test]
    fn test_other_errors_are_not_retryable() {
        let error = CatalogError::database_error(DbErr::Custom("no such table: dataset".to_owned()));

        assert!(matches!(error, CatalogError::DatabaseError(_)));
        assert!(!error.is_retryable());
        assert_eq!("DatabaseError", error.name());
    }

    #[test]
    fn test_invalid_names_are_invalid_arguments() {
        let error: CatalogError = quarry::name::validate_name(" padded").unwrap_err().into();

        assert!(matches!(error, CatalogError::InvalidArgument(_)));
    }

    #[test]
    fn test_display() {
        let error = CatalogError::not_found(EntityKind::DataFile, "a.csv");
        assert_eq!("The data file \"a.csv\" does not exist.", error.to_string());
    }
}
