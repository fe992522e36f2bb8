//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections backing the cart key-value store.
//! - Apply schema migrations in deterministic order.
//! - Report failures together with the database they happened on.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No key-value reads or writes happen before migrations succeed.
//! - Errors returned by `open_db*` are always `DbError::Open`.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Where a connection points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

impl DbLocation {
    /// Short label used in `mode=` log fields.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }
}

impl Display for DbLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory => write!(f, ":memory:"),
        }
    }
}

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Connection or bootstrap failure on one database.
    Open {
        location: DbLocation,
        source: Box<DbError>,
    },
}

impl DbError {
    pub(crate) fn at(location: DbLocation, source: impl Into<DbError>) -> Self {
        Self::Open {
            location,
            source: Box::new(source.into()),
        }
    }

    /// Database the failure happened on, when known.
    pub fn location(&self) -> Option<&DbLocation> {
        match self {
            Self::Open { location, .. } => Some(location),
            Self::Sqlite(_) | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }

    /// Underlying failure with location context removed.
    pub fn root(&self) -> &DbError {
        match self {
            Self::Open { source, .. } => source.root(),
            other => other,
        }
    }

    /// Stable `error_code=` value for log events.
    pub fn error_code(&self) -> &'static str {
        match self.root() {
            Self::Sqlite(_) => "db_sqlite_failed",
            Self::UnsupportedSchemaVersion { .. } => "db_schema_too_new",
            Self::Open { .. } => "db_open_failed",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::Open { location, source } => {
                write!(f, "cannot open cart database `{location}`: {source}")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::Open { source, .. } => Some(source.as_ref()),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
