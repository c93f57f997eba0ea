//! Fetch-then-aggregate cycle and the interval scheduler that drives it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use skywatch_core::{AppResult, ConfigError, WeatherConfig};
use skywatch_weather::{DailySummary, OpenWeatherClient};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::aggregate::DailyAggregator;
use crate::fetcher::WeatherFetcher;
use crate::store::SharedStore;

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The fetch failed; aggregation was skipped until the next cycle.
    FetchFailed,
    /// A reading was stored and the day re-aggregated.
    Aggregated(Option<DailySummary>),
}

#[derive(Clone)]
pub struct WeatherPipeline {
    fetcher: WeatherFetcher,
    aggregator: DailyAggregator,
}

impl WeatherPipeline {
    pub fn new(fetcher: WeatherFetcher, aggregator: DailyAggregator) -> Self {
        Self {
            fetcher,
            aggregator,
        }
    }

    /// Build the fetcher and aggregator over one shared store.
    pub fn from_config(config: &WeatherConfig, store: SharedStore) -> Result<Self, ConfigError> {
        let client = OpenWeatherClient::from_config(config)?;
        Ok(Self::new(
            WeatherFetcher::new(client, store.clone(), config.default_location.clone()),
            DailyAggregator::new(store),
        ))
    }

    pub fn fetcher(&self) -> &WeatherFetcher {
        &self.fetcher
    }

    /// Fetch for the default location, then aggregate `today` only if the
    /// fetch succeeded.
    ///
    /// # Errors
    /// Store failures from either step.
    pub async fn run_cycle(&self, today: NaiveDate) -> AppResult<CycleOutcome> {
        self.run_cycle_for(None, today).await
    }

    pub async fn run_cycle_for(
        &self,
        location: Option<&str>,
        today: NaiveDate,
    ) -> AppResult<CycleOutcome> {
        if !self.fetcher.fetch(location).await? {
            return Ok(CycleOutcome::FetchFailed);
        }
        let summary = self.aggregator.aggregate(today).await?;
        Ok(CycleOutcome::Aggregated(summary))
    }
}

/// Runs the pipeline on a fixed interval until cancelled.
///
/// Every tick spawns its own cycle, so a cycle slower than the interval
/// overlaps the next one; the store serializes their writes.
pub struct Scheduler {
    pipeline: Arc<WeatherPipeline>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(pipeline: Arc<WeatherPipeline>, interval: Duration) -> Self {
        Self { pipeline, interval }
    }

    /// Tick until `shutdown` is cancelled, then wait for in-flight cycles.
    ///
    /// The first cycle fires immediately.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let tracker = TaskTracker::new();
        let mut cycle: u64 = 0;

        tracing::info!("Scheduler started, interval {:?}", self.interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    cycle += 1;
                    let pipeline = self.pipeline.clone();
                    tracker.spawn(run_logged(pipeline, cycle, Utc::now().date_naive()));
                }
            }
        }

        tracker.close();
        if !tracker.is_empty() {
            tracing::info!("Waiting for {} running cycle(s)", tracker.len());
        }
        tracker.wait().await;
        tracing::info!("Scheduler stopped after {} cycle(s)", cycle);
    }
}

async fn run_logged(pipeline: Arc<WeatherPipeline>, cycle: u64, today: NaiveDate) {
    match pipeline.run_cycle(today).await {
        Ok(CycleOutcome::FetchFailed) => {
            tracing::warn!("Cycle {}: fetch failed, aggregation skipped", cycle);
        }
        Ok(CycleOutcome::Aggregated(Some(summary))) => {
            tracing::debug!("Cycle {}: {}", cycle, summary);
        }
        Ok(CycleOutcome::Aggregated(None)) => {
            tracing::debug!("Cycle {}: nothing to aggregate for {}", cycle, today);
        }
        Err(e) => {
            tracing::error!("Cycle {} failed: {}", cycle, e);
        }
    }
}
