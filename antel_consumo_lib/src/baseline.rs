//! Per-day usage baseline, stored in SQLite.
//!
//! The portal only reports usage for the whole billing cycle. Remembering the
//! first reading of each calendar day turns that into "used today".

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

#[derive(thiserror::Error, Debug)]
pub enum BaselineError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub struct BaselineStore {
    conn: Connection,
}

impl BaselineStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BaselineError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, BaselineError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), BaselineError> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version < 1 {
            self.conn.execute(
                "CREATE TABLE IF NOT EXISTS daily_baseline (
                    day TEXT PRIMARY KEY,
                    baseline_gb REAL NOT NULL,
                    recorded_at TEXT NOT NULL
                )",
                [],
            )?;
            self.conn.pragma_update(None, "user_version", 1)?;
        }
        Ok(())
    }

    /// Gigabytes used on `day` given the cycle-to-date reading `used_gb`.
    ///
    /// The first reading of a day becomes its baseline and yields 0. Later
    /// readings yield the growth over the baseline, never negative, rounded
    /// to two decimals.
    pub fn daily_usage(&self, day: NaiveDate, used_gb: f64) -> Result<f64, BaselineError> {
        let key = day.format("%Y-%m-%d").to_string();
        let baseline: Option<f64> = self
            .conn
            .query_row(
                "SELECT baseline_gb FROM daily_baseline WHERE day = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match baseline {
            Some(baseline) => Ok(round2((used_gb - baseline).max(0.0))),
            None => {
                info!("New day {}, baseline set to {:.2} GB", key, used_gb);
                self.conn.execute(
                    "INSERT INTO daily_baseline (day, baseline_gb, recorded_at) VALUES (?1, ?2, ?3)",
                    params![key, used_gb, Utc::now().to_rfc3339()],
                )?;
                self.conn
                    .execute("DELETE FROM daily_baseline WHERE day < ?1", params![key])?;
                Ok(0.0)
            }
        }
    }

    /// Stored baseline for `day`, if any.
    pub fn baseline(&self, day: NaiveDate) -> Result<Option<f64>, BaselineError> {
        let key = day.format("%Y-%m-%d").to_string();
        let baseline = self
            .conn
            .query_row(
                "SELECT baseline_gb FROM daily_baseline WHERE day = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(baseline)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
