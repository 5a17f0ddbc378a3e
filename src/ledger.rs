// 🗄️ Build Ledger - SQLite audit trail of subset builds
//
// One row per (subset directory, build). (output_dir, content_hash) is
// UNIQUE, so recording a byte-identical rebuild into the same directory is
// detected as a duplicate instead of growing the history.

use crate::manifest::SubsetManifest;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub run_id: String,
    pub recorded_at: DateTime<Utc>,
    pub output_dir: String,
    pub source_dir: String,
    pub fraction: f64,
    pub policy: String,
    pub order_strategy: String,
    pub content_hash: String,
    /// Row counts per table, as JSON
    pub row_counts: serde_json::Value,
}

pub fn open_ledger(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open ledger {}", path.display()))?;
    setup_ledger(&conn)?;
    Ok(conn)
}

pub fn setup_ledger(conn: &Connection) -> Result<()> {
    // WAL keeps the ledger readable while a build appends to it
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subset_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            output_dir TEXT NOT NULL,
            source_dir TEXT NOT NULL,
            fraction REAL NOT NULL,
            policy TEXT NOT NULL,
            order_strategy TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            row_counts TEXT NOT NULL,
            UNIQUE(output_dir, content_hash)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subset_runs_fraction ON subset_runs(fraction)",
        [],
    )?;

    Ok(())
}

/// Record one written subset. Returns false when an identical build of the
/// same directory is already in the ledger.
pub fn record_subset(conn: &Connection, output_dir: &Path, manifest: &SubsetManifest) -> Result<bool> {
    let row_counts: serde_json::Map<String, serde_json::Value> = manifest
        .tables
        .iter()
        .map(|t| (t.table.clone(), serde_json::json!(t.rows)))
        .collect();
    let row_counts_json = serde_json::to_string(&row_counts)?;

    let result = conn.execute(
        "INSERT INTO subset_runs (
            run_id, recorded_at, output_dir, source_dir, fraction,
            policy, order_strategy, content_hash, row_counts
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            manifest.run_id,
            Utc::now().to_rfc3339(),
            output_dir.display().to_string(),
            manifest.source_dir,
            manifest.fraction,
            manifest.policy.as_str(),
            manifest.order.to_string(),
            manifest.content_hash,
            row_counts_json,
        ],
    );

    match result {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            tracing::info!(
                content_hash = %manifest.content_hash,
                "identical subset already recorded in ledger"
            );
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// All recorded builds, oldest first.
pub fn list_runs(conn: &Connection) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, recorded_at, output_dir, source_dir, fraction,
                policy, order_strategy, content_hash, row_counts
         FROM subset_runs
         ORDER BY id ASC",
    )?;

    let entries = stmt
        .query_map([], |row| {
            let recorded_at: String = row.get(1)?;
            let row_counts: String = row.get(8)?;

            Ok(LedgerEntry {
                run_id: row.get(0)?,
                recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
                    })?
                    .with_timezone(&Utc),
                output_dir: row.get(2)?,
                source_dir: row.get(3)?,
                fraction: row.get(4)?,
                policy: row.get(5)?,
                order_strategy: row.get(6)?,
                content_hash: row.get(7)?,
                row_counts: serde_json::from_str(&row_counts).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
                })?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

pub fn count_runs(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM subset_runs", [], |row| row.get(0))?;
    Ok(count)
}
