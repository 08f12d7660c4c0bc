//! SQLite persistence for runs and records.
//!
//! SQLite does not support concurrent writers safely, so every write
//! transaction in the process is serialized through one shared lock. Each
//! transaction acquires the lock, opens its own connection, does its work,
//! commits or rolls back, and releases the lock — at most one in-flight
//! write transaction system-wide. Timestamps are stored as epoch
//! milliseconds (i64).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::warn;
use rusqlite::{params, Connection, Transaction};

use crate::error::{AppResult, DaqError};

/// Schema for the run/record store.
const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

-- One row per bounded pipeline execution.
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT 'Collection',
    notes TEXT,
    user TEXT,
    started_at INTEGER NOT NULL,  -- epoch ms
    stopped_at INTEGER            -- epoch ms, NULL while in progress
);

-- One row per persisted sample, insertion-ordered within a run.
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    value REAL NOT NULL,
    unit TEXT NOT NULL,
    difference REAL NOT NULL,
    timestamp INTEGER NOT NULL    -- epoch ms
);

CREATE INDEX IF NOT EXISTS idx_records_run ON records(run_id);
"#;

/// Metadata supplied by the operator when a collection starts.
#[derive(Clone, Debug)]
pub struct NewRun {
    pub name: String,
    pub notes: Option<String>,
    pub user: String,
}

/// One bounded execution of the acquisition pipeline.
#[derive(Clone, Debug)]
pub struct Run {
    pub id: i64,
    pub name: String,
    pub notes: Option<String>,
    pub user: Option<String>,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
}

/// A single persisted sample belonging to a run.
#[derive(Clone, Debug)]
pub struct Record {
    pub id: i64,
    pub run_id: i64,
    pub value: f64,
    pub unit: String,
    pub difference: f64,
    pub timestamp: DateTime<Utc>,
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Handle to the SQLite store, cloneable across workers.
///
/// Clones share the same write lock; connections are opened per
/// transaction rather than held.
#[derive(Clone)]
pub struct Database {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the database file exists on disk.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Creates the schema if the database file is absent.
    ///
    /// An existing store is never overwritten: the call logs a warning and
    /// returns successfully, so it is safe to run twice or to race another
    /// process that created the store first.
    pub fn init(&self) -> AppResult<()> {
        if self.exists() {
            warn!("Database already exists. [{}]", self.path.display());
            return Ok(());
        }
        let _guard = self.guard();
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        // A poisoned lock only means another writer panicked mid-sample;
        // the () guard carries no state to corrupt.
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn connect(&self) -> AppResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    /// Runs `f` inside one exclusive write transaction.
    ///
    /// Commit happens only when `f` succeeds; on error the transaction is
    /// rolled back (dropped) and the error re-raised to the caller.
    fn with_write<T>(&self, f: impl FnOnce(&Transaction) -> AppResult<T>) -> AppResult<T> {
        let _guard = self.guard();
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Inserts the run row and returns its storage-assigned id.
    pub fn insert_run(&self, new: &NewRun, started_at: DateTime<Utc>) -> AppResult<i64> {
        self.with_write(|tx| {
            tx.execute(
                "INSERT INTO runs (name, notes, user, started_at) VALUES (?1, ?2, ?3, ?4)",
                params![new.name, new.notes, new.user, to_millis(started_at)],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    /// Appends one record under `run_id` as a single committed transaction.
    pub fn insert_record(
        &self,
        run_id: i64,
        value: f64,
        unit: &str,
        difference: f64,
        timestamp: DateTime<Utc>,
    ) -> AppResult<i64> {
        self.with_write(|tx| {
            tx.execute(
                "INSERT INTO records (run_id, value, unit, difference, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![run_id, value, unit, difference, to_millis(timestamp)],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    /// Sets the run's stop timestamp. Expected to be called exactly once.
    pub fn close_run(&self, run_id: i64, stopped_at: DateTime<Utc>) -> AppResult<()> {
        self.with_write(|tx| {
            tx.execute(
                "UPDATE runs SET stopped_at = ?1 WHERE id = ?2",
                params![to_millis(stopped_at), run_id],
            )?;
            Ok(())
        })
    }

    /// All stored runs, oldest first.
    pub fn list_runs(&self) -> AppResult<Vec<Run>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, notes, user, started_at, stopped_at FROM runs ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Run {
                id: row.get(0)?,
                name: row.get(1)?,
                notes: row.get(2)?,
                user: row.get(3)?,
                started_at: from_millis(row.get(4)?),
                stopped_at: row.get::<_, Option<i64>>(5)?.map(from_millis),
            })
        })?;
        let mut runs = Vec::new();
        for run in rows {
            runs.push(run?);
        }
        Ok(runs)
    }

    /// Looks up one run by id.
    pub fn run(&self, run_id: i64) -> AppResult<Run> {
        self.list_runs()?
            .into_iter()
            .find(|r| r.id == run_id)
            .ok_or_else(|| DaqError::NoRows(format!("no run with id {run_id}")))
    }

    /// All records of a run in insertion order.
    pub fn records(&self, run_id: i64) -> AppResult<Vec<Record>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, run_id, value, unit, difference, timestamp
             FROM records WHERE run_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([run_id], |row| {
            Ok(Record {
                id: row.get(0)?,
                run_id: row.get(1)?,
                value: row.get(2)?,
                unit: row.get(3)?,
                difference: row.get(4)?,
                timestamp: from_millis(row.get(5)?),
            })
        })?;
        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    /// The ordered value sequence of a run, for the replay source.
    pub fn record_values(&self, run_id: i64) -> AppResult<Vec<f64>> {
        Ok(self.records(run_id)?.into_iter().map(|r| r.value).collect())
    }
}
