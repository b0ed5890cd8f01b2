// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use tokio_rusqlite::Connection;
use wagate_core::GateError;

use crate::migrations;

/// Handle to the single serialized SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path` in WAL mode, apply PRAGMAs,
    /// and run all pending migrations.
    pub async fn open(path: &str) -> Result<Self, GateError> {
        Self::open_with(path, true).await
    }

    /// Like [`Database::open`], with the journal mode under the caller's
    /// control.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, GateError> {
        // Migrations run on a short-lived blocking connection before the
        // serialized async connection takes over.
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), GateError> {
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(|e| GateError::Storage {
                    source: Box::new(e),
                })?;
            if wal_mode {
                conn.execute_batch("PRAGMA journal_mode = WAL;")
                    .map_err(|e| GateError::Storage {
                        source: Box::new(e),
                    })?;
            }
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| GateError::Internal(format!("migration task panicked: {e}")))??;

        let conn = Connection::open(path)
            .await
            .map_err(|e| GateError::Storage {
                source: Box::new(e),
            })?;
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA foreign_keys = ON;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        tracing::debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying serialized connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Flush and close the connection.
    pub async fn close(&self) -> Result<(), GateError> {
        self.conn.call(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
    }
}

/// Convert a tokio-rusqlite error into the storage error variant.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> GateError {
    GateError::Storage {
        source: Box::new(e),
    }
}

/// Current UTC time in the storage timestamp format.
///
/// Matches SQLite's `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')` so Rust- and
/// SQL-generated timestamps compare lexicographically.
pub fn now_utc() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// A UTC time `secs` in the future, in the storage timestamp format.
pub fn utc_after_secs(secs: i64) -> String {
    (chrono::Utc::now() + chrono::Duration::seconds(secs))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
