//! SQLite file backing the overlay slots.
//!
//! # Responsibility
//! - Open connections shared by every overlay store of one context.
//! - Keep the slot table schema current before the first slot access.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - A database written by a newer binary is refused, never downgraded.

use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Short reason when SQLite refused the operation because of the medium
    /// (lock held by another context, disk full, read-only file) rather than
    /// a bug in the statement.
    pub fn refusal(&self) -> Option<&'static str> {
        let Self::Sqlite(rusqlite::Error::SqliteFailure(failure, _)) = self else {
            return None;
        };
        match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => Some("locked by another context"),
            ErrorCode::DiskFull => Some("quota exceeded"),
            ErrorCode::ReadOnly => Some("read-only medium"),
            _ => None,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "overlay store schema v{db_version} was written by a newer build (this build supports up to v{latest_supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

#[cfg(test)]
mod tests {
    use super::DbError;
    use rusqlite::ffi;

    fn failure(code: i32) -> DbError {
        DbError::Sqlite(rusqlite::Error::SqliteFailure(ffi::Error::new(code), None))
    }

    #[test]
    fn medium_refusals_are_recognized() {
        assert_eq!(failure(ffi::SQLITE_BUSY).refusal(), Some("locked by another context"));
        assert_eq!(failure(ffi::SQLITE_FULL).refusal(), Some("quota exceeded"));
        assert_eq!(failure(ffi::SQLITE_READONLY).refusal(), Some("read-only medium"));
        assert_eq!(failure(ffi::SQLITE_CONSTRAINT).refusal(), None);
        assert_eq!(
            DbError::UnsupportedSchemaVersion {
                db_version: 2,
                latest_supported: 1
            }
            .refusal(),
            None
        );
    }
}
