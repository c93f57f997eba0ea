//! Fetch → persist → aggregate pipeline for Skywatch.

pub mod aggregate;
pub mod browse;
pub mod fetcher;
pub mod pipeline;
pub mod store;
pub mod store_backend;

pub use aggregate::{aggregate_day, dominant_condition, summarize, DailyAggregator};
pub use browse::{ReadingQuery, SummaryQuery};
pub use fetcher::WeatherFetcher;
pub use pipeline::{CycleOutcome, Scheduler, WeatherPipeline};
pub use store::{SharedStore, SqliteWeatherStore};
pub use store_backend::{ReadingStore, StoreResult, SummaryStore};
