//! Shared error and result plumbing for the revision-ledger layer.
//!
//! # Responsibility
//! - Define one error taxonomy used by accessors and services.
//! - Classify SQLite failures into store faults vs. transient access faults.
//!
//! # Invariants
//! - Public read paths return `Option::None` for absent revisions; `NotFound`
//!   marks an item that must exist but does not.
//! - `MalformedFilter` never crosses a service boundary; services log it and
//!   degrade to an empty page.

use crate::db::BootstrapError;
use crate::model::entity::{EntityId, EntityType};
use crate::model::revision::RevisionNumber;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Error taxonomy for ledger, containment and service operations.
#[derive(Debug)]
pub enum LedgerError {
    /// Non-transient SQLite failure while serving an operation.
    Sqlite(rusqlite::Error),
    /// Connection could not be opened, configured or migrated.
    Bootstrap(BootstrapError),
    /// Store was busy/locked or the row vanished mid-read.
    TransientAccess(String),
    /// Absent entity or revision on a path that requires one.
    NotFound {
        entity_type: EntityType,
        entity_id: EntityId,
        revision: Option<RevisionNumber>,
    },
    /// User-supplied filter cannot be parsed.
    MalformedFilter { filter: String, message: String },
    /// Caller passed an argument outside the operation contract.
    InvalidArgument(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl LedgerError {
    pub(crate) fn malformed(filter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedFilter {
            filter: filter.into(),
            message: message.into(),
        }
    }

    /// Stable short code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "db_error",
            Self::Bootstrap(_) => "db_bootstrap",
            Self::TransientAccess(_) => "transient_access",
            Self::NotFound { .. } => "not_found",
            Self::MalformedFilter { .. } => "malformed_filter",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::MissingRequiredTable(_) => "missing_table",
            Self::InvalidData(_) => "invalid_data",
        }
    }
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Bootstrap(err) => write!(f, "{err}"),
            Self::TransientAccess(message) => write!(f, "transient store access fault: {message}"),
            Self::NotFound {
                entity_type,
                entity_id,
                revision: Some(revision),
            } => write!(
                f,
                "revision {revision} not found for {} {entity_id}",
                entity_type.as_str()
            ),
            Self::NotFound {
                entity_type,
                entity_id,
                revision: None,
            } => write!(f, "{} not found: {entity_id}", entity_type.as_str()),
            Self::MalformedFilter { filter, message } => {
                write!(f, "malformed filter `{filter}`: {message}")
            }
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "ledger store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "ledger store requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid ledger data: {message}"),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Bootstrap(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BootstrapError> for LedgerError {
    fn from(value: BootstrapError) -> Self {
        if value.sqlite().is_some_and(is_transient) {
            return Self::TransientAccess(value.to_string());
        }
        Self::Bootstrap(value)
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        if is_transient(&value) {
            return Self::TransientAccess(value.to_string());
        }
        Self::Sqlite(value)
    }
}

fn is_transient(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}
