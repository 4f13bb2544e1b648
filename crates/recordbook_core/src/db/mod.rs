//! Ledger database bootstrap: open, configure, migrate.
//!
//! Every failure before a connection is handed to `SqliteStore` is a
//! [`BootstrapError`] naming the stage that failed, so an operator can tell
//! a locked file from a broken migration without reading SQLite codes.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, open_db_with_settings};

pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// Connection bootstrap stage that failed.
#[derive(Debug)]
pub enum BootstrapError {
    /// The database could not be opened (`file` or `memory`).
    Open {
        mode: &'static str,
        source: rusqlite::Error,
    },
    /// A connection pragma (`foreign_keys`, `busy_timeout`) was refused.
    Pragma {
        pragma: &'static str,
        source: rusqlite::Error,
    },
    /// `PRAGMA user_version` could not be read.
    SchemaVersionRead(rusqlite::Error),
    /// One migration step failed; the schema stays at its prior version.
    Migration {
        version: u32,
        source: rusqlite::Error,
    },
    /// The file was written by a newer binary.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl BootstrapError {
    /// Underlying SQLite failure, when the stage failed inside SQLite.
    pub fn sqlite(&self) -> Option<&rusqlite::Error> {
        match self {
            Self::Open { source, .. }
            | Self::Pragma { source, .. }
            | Self::Migration { source, .. }
            | Self::SchemaVersionRead(source) => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl Display for BootstrapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { mode, source } => write!(f, "cannot open {mode} ledger: {source}"),
            Self::Pragma { pragma, source } => {
                write!(f, "cannot set pragma `{pragma}`: {source}")
            }
            Self::SchemaVersionRead(source) => {
                write!(f, "cannot read ledger schema version: {source}")
            }
            Self::Migration { version, source } => {
                write!(f, "ledger migration {version:04} failed: {source}")
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "ledger schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for BootstrapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.sqlite().map(|err| err as &(dyn Error + 'static))
    }
}
