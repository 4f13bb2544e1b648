//! SQLite-backed store implementing the ledger and containment accessors.
//!
//! # Responsibility
//! - Own the borrowed connection shared by both accessor implementations.
//! - Provide transaction scoping for service-level operations.
//!
//! # Invariants
//! - A store is only constructed over a connection migrated to the latest
//!   schema version.
//! - Nested `in_transaction` calls join the outer transaction instead of
//!   opening a second one.

use crate::db::migrations::latest_version;
use crate::error::{LedgerError, LedgerResult};
use rusqlite::{Connection, Transaction, TransactionBehavior};

const REQUIRED_TABLES: [&str; 6] = [
    "revision_info",
    "entities",
    "revisions",
    "revision_fields",
    "revision_attachments",
    "containment_edges",
];

/// Transaction intent for one service-level operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// Consistent snapshot for paired count/page reads.
    Read,
    /// Reserved write lock for mutations.
    Write,
}

/// Unit-of-work seam used by services.
///
/// Implementations commit when `work` returns `Ok` and roll back otherwise.
pub trait Transactional {
    fn in_transaction<T, F>(&self, mode: TxMode, work: F) -> LedgerResult<T>
    where
        F: FnOnce() -> LedgerResult<T>;
}

/// SQLite store over one migrated connection.
#[derive(Clone, Copy)]
pub struct SqliteStore<'conn> {
    pub(crate) conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    /// Creates a store from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema version does not match.
    /// - `MissingRequiredTable` when a ledger table is absent.
    pub fn try_new(conn: &'conn Connection) -> LedgerResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl Transactional for SqliteStore<'_> {
    fn in_transaction<T, F>(&self, mode: TxMode, work: F) -> LedgerResult<T>
    where
        F: FnOnce() -> LedgerResult<T>,
    {
        if !self.conn.is_autocommit() {
            return work();
        }

        let behavior = match mode {
            TxMode::Read => TransactionBehavior::Deferred,
            TxMode::Write => TransactionBehavior::Immediate,
        };
        let tx = Transaction::new_unchecked(self.conn, behavior)?;
        let value = work()?;
        tx.commit()?;
        Ok(value)
    }
}

fn ensure_store_connection_ready(conn: &Connection) -> LedgerResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(LedgerError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(LedgerError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> LedgerResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &'static str) -> LedgerResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(LedgerError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> LedgerResult<uuid::Uuid> {
    uuid::Uuid::parse_str(value)
        .map_err(|_| LedgerError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
