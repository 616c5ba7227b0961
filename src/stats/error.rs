//! Error types for statistics operations.

use std::fmt;

use thiserror::Error;

use crate::permissions::Permission;

/// Structured classification for storage failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsDbErrorKind {
    /// `SQLite` returned busy/locked under concurrent access.
    BusyOrLocked,
    /// Constraint failure (unique/foreign-key/check/not-null).
    ConstraintViolation,
    /// Connection pool timed out waiting for a free connection.
    PoolTimeout,
    /// Connection pool is closed.
    PoolClosed,
    /// Expected row was not found.
    RowNotFound,
    /// Filesystem or transport IO failure.
    Io,
    /// SQL protocol/driver error.
    Protocol,
    /// Unclassified database failure.
    Other,
}

impl StatsDbErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::RowNotFound => Self::RowNotFound,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::Protocol(_) => Self::Protocol,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for StatsDbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::RowNotFound => "row_not_found",
            Self::Io => "io",
            Self::Protocol => "protocol",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(
    database_error: &(dyn sqlx::error::DatabaseError + 'static),
) -> StatsDbErrorKind {
    let code = database_error.code();
    if matches!(
        code.as_deref(),
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
    ) {
        return StatsDbErrorKind::BusyOrLocked;
    }

    if database_error.is_unique_violation()
        || database_error.is_foreign_key_violation()
        || database_error.is_check_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT"))
    {
        return StatsDbErrorKind::ConstraintViolation;
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("database is busy")
    {
        return StatsDbErrorKind::BusyOrLocked;
    }

    StatsDbErrorKind::Other
}

/// Errors that can occur during statistics operations.
#[derive(Debug, Clone, Error)]
pub enum StatsError {
    /// Underlying persistence is unavailable or rejected the operation.
    #[error("storage error ({kind}): {message}")]
    Storage {
        /// Typed classification of the failure.
        kind: StatsDbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// Ranking was requested by a field that is not a counter column.
    #[error(
        "invalid order field '{0}'\n  Suggestion: Use one of: total_count, day_count, last_timestamp"
    )]
    InvalidOrderField(String),

    /// The acting user lacks a required permission.
    #[error("access denied: user {user_id} lacks '{permission}'")]
    AccessDenied {
        /// The user that attempted the action.
        user_id: i64,
        /// The permission that was missing.
        permission: Permission,
    },
}

impl From<sqlx::Error> for StatsError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage {
            kind: StatsDbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl StatsError {
    /// Returns the typed storage error kind, when this is a storage error.
    #[must_use]
    pub fn storage_kind(&self) -> Option<StatsDbErrorKind> {
        match self {
            Self::Storage { kind, .. } => Some(*kind),
            Self::InvalidOrderField(_) | Self::AccessDenied { .. } => None,
        }
    }

    /// Returns true when this error is a database busy/locked condition.
    #[must_use]
    pub fn is_busy_or_locked(&self) -> bool {
        self.storage_kind() == Some(StatsDbErrorKind::BusyOrLocked)
    }
}
