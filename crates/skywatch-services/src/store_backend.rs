//! Storage traits for readings and daily summaries.
//!
//! The pipeline only talks to these traits; `SqliteWeatherStore` is the
//! implementation used by the binary and the tests.

use chrono::NaiveDate;
use skywatch_core::DatabaseError;
use skywatch_weather::{DailySummary, Observation, Reading};

use crate::browse::{ReadingQuery, SummaryQuery};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, DatabaseError>;

/// Append-only collection of weather readings.
///
/// Implementations don't need to be Sync - callers share a store behind a
/// Mutex.
pub trait ReadingStore: Send {
    /// Persist one observation as a new reading.
    ///
    /// # Errors
    /// Returns a `DatabaseError` if the row could not be written; nothing
    /// is stored in that case.
    fn insert_reading(&self, observation: &Observation) -> StoreResult<Reading>;

    /// All readings whose UTC timestamp falls on `date`, in insertion order.
    ///
    /// Insertion order is the store's natural order and decides
    /// dominant-condition ties.
    fn readings_on(&self, date: NaiveDate) -> StoreResult<Vec<Reading>>;

    /// Browse readings, newest first.
    fn query_readings(&self, query: &ReadingQuery) -> StoreResult<Vec<Reading>>;

    fn count_readings(&self) -> StoreResult<usize>;
}

/// One rollup per calendar date.
pub trait SummaryStore: Send {
    /// Insert the summary for its date, or overwrite the existing one.
    ///
    /// This is a single atomic write; implementations must not read first.
    fn upsert_summary(&self, summary: &DailySummary) -> StoreResult<DailySummary>;

    fn summary_for(&self, date: NaiveDate) -> StoreResult<Option<DailySummary>>;

    /// Browse summaries, newest date first.
    fn query_summaries(&self, query: &SummaryQuery) -> StoreResult<Vec<DailySummary>>;

    fn count_summaries(&self) -> StoreResult<usize>;
}
