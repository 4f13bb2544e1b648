//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by ledger behavior.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`, so child-snapshot rows
//!   cannot outlive their revision header.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::{BootstrapError, BootstrapResult};
use crate::settings::LedgerSettings;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens a SQLite database file with default settings and applies all
/// pending migrations.
pub fn open_db(path: impl AsRef<Path>) -> BootstrapResult<Connection> {
    open_db_with_settings(path, &LedgerSettings::default())
}

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_with_settings(
    path: impl AsRef<Path>,
    settings: &LedgerSettings,
) -> BootstrapResult<Connection> {
    open_with("file", settings, || Connection::open(path))
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory() -> BootstrapResult<Connection> {
    open_with("memory", &LedgerSettings::default(), Connection::open_in_memory)
}

fn open_with(
    mode: &'static str,
    settings: &LedgerSettings,
    opener: impl FnOnce() -> rusqlite::Result<Connection>,
) -> BootstrapResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match opener() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(BootstrapError::Open { mode, source: err });
        }
    };

    match bootstrap_connection(&mut conn, settings) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, settings: &LedgerSettings) -> BootstrapResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|source| BootstrapError::Pragma {
            pragma: "foreign_keys",
            source,
        })?;
    conn.busy_timeout(Duration::from_millis(settings.busy_timeout_ms))
        .map_err(|source| BootstrapError::Pragma {
            pragma: "busy_timeout",
            source,
        })?;
    apply_migrations(conn)?;
    Ok(())
}
