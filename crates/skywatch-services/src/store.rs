//! SQLite-backed reading and daily summary storage.
//!
//! Both collections live in one database file. Readings are append-only;
//! summaries are unique per date and written with a single
//! `INSERT ... ON CONFLICT(date) DO UPDATE` statement.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use skywatch_core::DatabaseError;
use skywatch_weather::{DailySummary, Observation, Reading};
use std::path::Path;
use std::sync::Arc;

use crate::browse::{ReadingQuery, SummaryQuery};
use crate::store_backend::{ReadingStore, StoreResult, SummaryStore};

const SCHEMA_VERSION: i32 = 1;
const DATE_FORMAT: &str = "%Y-%m-%d";
const SECONDS_PER_DAY: i64 = 86_400;

/// Store handle shared between the fetcher, aggregator and scheduler tasks.
pub type SharedStore = Arc<Mutex<SqliteWeatherStore>>;

/// Unix-second bounds `[start, end)` of a UTC calendar day.
pub(crate) fn day_bounds(date: NaiveDate) -> (i64, i64) {
    let start = date.and_time(NaiveTime::MIN).and_utc().timestamp();
    (start, start + SECONDS_PER_DAY)
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub struct SqliteWeatherStore {
    conn: Connection,
}

impl SqliteWeatherStore {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| {
            DatabaseError::ConnectionFailed(format!("{}: {}", path.as_ref().display(), e))
        })?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Wrap the store for sharing across tasks.
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    fn init_schema(&self) -> StoreResult<()> {
        self.conn
            .execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)", [])?;

        let version: Option<i32> = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
            .optional()?;

        match version {
            Some(v) if v > SCHEMA_VERSION => {
                return Err(DatabaseError::MigrationFailed(format!(
                    "database schema v{} is newer than supported v{}",
                    v, SCHEMA_VERSION
                )));
            }
            Some(_) => {}
            None => {
                self.conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?1)",
                    params![SCHEMA_VERSION],
                )?;
            }
        }

        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                condition TEXT NOT NULL CHECK (length(condition) <= 50),
                temperature REAL NOT NULL,
                feels_like REAL NOT NULL,
                observed_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_readings_observed_at ON readings(observed_at);
            CREATE INDEX IF NOT EXISTS idx_readings_condition ON readings(condition);

            CREATE TABLE IF NOT EXISTS daily_summaries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL UNIQUE,
                avg_temp REAL NOT NULL,
                max_temp REAL NOT NULL,
                min_temp REAL NOT NULL,
                dominant_condition TEXT NOT NULL CHECK (length(dominant_condition) <= 50)
            );
            "#,
        )?;
        Ok(())
    }

    /// Convert a `readings` row (id, condition, temperature, feels_like,
    /// observed_at) to a Reading.
    fn row_to_reading(row: &rusqlite::Row) -> rusqlite::Result<Reading> {
        let observed_secs: i64 = row.get(4)?;
        let observed_at = DateTime::<Utc>::from_timestamp(observed_secs, 0)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, observed_secs))?;

        Ok(Reading {
            id: row.get(0)?,
            condition: row.get(1)?,
            temp: row.get(2)?,
            feels_like: row.get(3)?,
            observed_at,
        })
    }

    fn row_to_summary(row: &rusqlite::Row) -> rusqlite::Result<DailySummary> {
        let date_str: String = row.get(0)?;
        let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

        Ok(DailySummary {
            date,
            avg_temp: row.get(1)?,
            max_temp: row.get(2)?,
            min_temp: row.get(3)?,
            dominant_condition: row.get(4)?,
        })
    }

    fn count(&self, table: &str) -> StoreResult<usize> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl ReadingStore for SqliteWeatherStore {
    fn insert_reading(&self, observation: &Observation) -> StoreResult<Reading> {
        self.conn.execute(
            "INSERT INTO readings (condition, temperature, feels_like, observed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                observation.condition,
                observation.temp,
                observation.feels_like,
                observation.observed_at.timestamp(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        tracing::debug!("Inserted reading {}", id);
        Ok(Reading::from_observation(id, observation.clone()))
    }

    fn readings_on(&self, date: NaiveDate) -> StoreResult<Vec<Reading>> {
        let (start, end) = day_bounds(date);
        let mut stmt = self.conn.prepare(
            "SELECT id, condition, temperature, feels_like, observed_at
             FROM readings
             WHERE observed_at >= ?1 AND observed_at < ?2
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![start, end], Self::row_to_reading)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn query_readings(&self, query: &ReadingQuery) -> StoreResult<Vec<Reading>> {
        let (sql, values) = query.to_sql();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::row_to_reading)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn count_readings(&self) -> StoreResult<usize> {
        self.count("readings")
    }
}

impl SummaryStore for SqliteWeatherStore {
    fn upsert_summary(&self, summary: &DailySummary) -> StoreResult<DailySummary> {
        self.conn.execute(
            r#"
            INSERT INTO daily_summaries (date, avg_temp, max_temp, min_temp, dominant_condition)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(date) DO UPDATE SET
                avg_temp = excluded.avg_temp,
                max_temp = excluded.max_temp,
                min_temp = excluded.min_temp,
                dominant_condition = excluded.dominant_condition
            "#,
            params![
                format_date(summary.date),
                summary.avg_temp,
                summary.max_temp,
                summary.min_temp,
                summary.dominant_condition,
            ],
        )?;

        tracing::debug!("Upserted summary for {}", summary.date);
        Ok(summary.clone())
    }

    fn summary_for(&self, date: NaiveDate) -> StoreResult<Option<DailySummary>> {
        Ok(self
            .conn
            .query_row(
                "SELECT date, avg_temp, max_temp, min_temp, dominant_condition
                 FROM daily_summaries WHERE date = ?1",
                params![format_date(date)],
                Self::row_to_summary,
            )
            .optional()?)
    }

    fn query_summaries(&self, query: &SummaryQuery) -> StoreResult<Vec<DailySummary>> {
        let (sql, values) = query.to_sql();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::row_to_summary)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn count_summaries(&self) -> StoreResult<usize> {
        self.count("daily_summaries")
    }
}
