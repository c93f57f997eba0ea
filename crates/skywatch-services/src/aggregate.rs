//! Daily rollup of readings into a summary.

use chrono::{NaiveDate, Utc};
use skywatch_core::AppResult;
use skywatch_weather::{DailySummary, Reading};

use crate::store::SharedStore;
use crate::store_backend::{ReadingStore, StoreResult, SummaryStore};

/// Most frequent condition label.
///
/// Ties go to the label that appears first in `readings`, so the result
/// depends only on the store's query order.
pub fn dominant_condition(readings: &[Reading]) -> Option<&str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for reading in readings {
        match counts.iter_mut().find(|(label, _)| *label == reading.condition) {
            Some((_, n)) => *n += 1,
            None => counts.push((reading.condition.as_str(), 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (label, n) in counts {
        // strictly greater keeps the earliest label on ties
        if best.map_or(true, |(_, top)| n > top) {
            best = Some((label, n));
        }
    }
    best.map(|(label, _)| label)
}

/// Compute the summary for `date` from that day's readings.
///
/// Returns `None` when there are no readings.
pub fn summarize(date: NaiveDate, readings: &[Reading]) -> Option<DailySummary> {
    let first = readings.first()?;
    let dominant = dominant_condition(readings)?;

    let (sum, max_temp, min_temp) = readings.iter().fold(
        (0.0_f64, first.temp, first.temp),
        |(sum, max, min), r| (sum + r.temp, max.max(r.temp), min.min(r.temp)),
    );

    Some(DailySummary {
        date,
        avg_temp: sum / readings.len() as f64,
        max_temp,
        min_temp,
        dominant_condition: dominant.to_string(),
    })
}

/// Recompute and store the summary for `date`.
///
/// A day without readings is logged and left untouched. Store errors are
/// returned as-is.
pub fn aggregate_day<S>(store: &S, date: NaiveDate) -> StoreResult<Option<DailySummary>>
where
    S: ReadingStore + SummaryStore + ?Sized,
{
    let readings = store.readings_on(date)?;

    let Some(summary) = summarize(date, &readings) else {
        tracing::info!("No weather data available for {}", date);
        return Ok(None);
    };

    let stored = store.upsert_summary(&summary)?;
    tracing::info!(
        "Daily weather summary updated from {} readings: {}",
        readings.len(),
        stored
    );
    Ok(Some(stored))
}

/// Async entry point for aggregation over the shared store.
#[derive(Clone)]
pub struct DailyAggregator {
    store: SharedStore,
}

impl DailyAggregator {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Aggregate the readings of `date`.
    ///
    /// # Errors
    /// Returns `AppError::Database` when the store fails; an empty day is
    /// not an error.
    pub async fn aggregate(&self, date: NaiveDate) -> AppResult<Option<DailySummary>> {
        let store = self.store.clone();
        let summary = tokio::task::spawn_blocking(move || aggregate_day(&*store.lock(), date))
            .await
            .map_err(anyhow::Error::from)??;
        Ok(summary)
    }

    /// Aggregate the current UTC date.
    pub async fn aggregate_today(&self) -> AppResult<Option<DailySummary>> {
        self.aggregate(Utc::now().date_naive()).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::store::SqliteWeatherStore;
    use chrono::{TimeZone, Timelike};
    use skywatch_weather::Observation;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn readings(items: &[(&str, f64)]) -> Vec<Reading> {
        items
            .iter()
            .enumerate()
            .map(|(i, (condition, temp))| Reading {
                id: i as i64 + 1,
                condition: condition.to_string(),
                temp: *temp,
                feels_like: *temp,
                observed_at: Utc.with_ymd_and_hms(2024, 5, 1, i as u32, 0, 0).unwrap(),
            })
            .collect()
    }

    fn seed(store: &SqliteWeatherStore, items: &[(&str, f64)]) {
        for r in readings(items) {
            store
                .insert_reading(&Observation {
                    condition: r.condition,
                    temp: r.temp,
                    feels_like: r.feels_like,
                    observed_at: r.observed_at.with_minute(30).unwrap(),
                })
                .unwrap();
        }
    }

    #[test]
    fn test_summarize_scenario() {
        let summary = summarize(
            day(),
            &readings(&[("Clouds", 10.0), ("Clouds", 20.0), ("Rain", 30.0)]),
        )
        .unwrap();

        assert_eq!(summary.avg_temp, 20.0);
        assert_eq!(summary.max_temp, 30.0);
        assert_eq!(summary.min_temp, 10.0);
        assert_eq!(summary.dominant_condition, "Clouds");
        assert_eq!(summary.date, day());
    }

    #[test]
    fn test_summarize_empty() {
        assert!(summarize(day(), &[]).is_none());
        assert!(dominant_condition(&[]).is_none());
    }

    #[test]
    fn test_summarize_negative_temperatures() {
        let summary = summarize(day(), &readings(&[("Snow", -4.0), ("Snow", -12.0)])).unwrap();
        assert_eq!(summary.max_temp, -4.0);
        assert_eq!(summary.min_temp, -12.0);
        assert_eq!(summary.avg_temp, -8.0);
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        let r = readings(&[("Clear", 1.0), ("Rain", 1.0), ("Clear", 1.0), ("Rain", 1.0)]);
        assert_eq!(dominant_condition(&r), Some("Clear"));

        let r = readings(&[("Rain", 1.0), ("Clear", 1.0), ("Clear", 1.0), ("Rain", 1.0)]);
        assert_eq!(dominant_condition(&r), Some("Rain"));
    }

    #[test]
    fn test_majority_beats_first_seen() {
        let r = readings(&[("Clear", 1.0), ("Rain", 1.0), ("Rain", 1.0)]);
        assert_eq!(dominant_condition(&r), Some("Rain"));
    }

    #[test]
    fn test_aggregate_day_without_readings_writes_nothing() {
        let store = SqliteWeatherStore::in_memory().unwrap();
        assert!(aggregate_day(&store, day()).unwrap().is_none());
        assert_eq!(store.count_summaries().unwrap(), 0);
    }

    #[test]
    fn test_aggregate_day_is_idempotent() {
        let store = SqliteWeatherStore::in_memory().unwrap();
        seed(&store, &[("Clear", 11.1), ("Rain", 7.3), ("Clear", 9.9), ("Rain", 14.2)]);

        let first = aggregate_day(&store, day()).unwrap().unwrap();
        for _ in 0..3 {
            let again = aggregate_day(&store, day()).unwrap().unwrap();
            assert_eq!(again.avg_temp.to_bits(), first.avg_temp.to_bits());
            assert_eq!(again, first);
        }
        assert_eq!(first.dominant_condition, "Clear");
        assert_eq!(store.count_summaries().unwrap(), 1);
        assert_eq!(store.summary_for(day()).unwrap(), Some(first));
    }

    #[test]
    fn test_aggregate_day_picks_up_new_readings() {
        let store = SqliteWeatherStore::in_memory().unwrap();
        seed(&store, &[("Clear", 10.0)]);
        aggregate_day(&store, day()).unwrap();

        seed(&store, &[("Rain", 20.0), ("Rain", 30.0)]);
        let updated = aggregate_day(&store, day()).unwrap().unwrap();

        assert_eq!(updated.avg_temp, 20.0);
        assert_eq!(updated.dominant_condition, "Rain");
        assert_eq!(store.count_summaries().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_aggregator_over_shared_store() {
        let store = SqliteWeatherStore::in_memory().unwrap().into_shared();
        seed(&store.lock(), &[("Clouds", 10.0), ("Clouds", 20.0), ("Rain", 30.0)]);

        let aggregator = DailyAggregator::new(store.clone());
        let summary = aggregator.aggregate(day()).await.unwrap().unwrap();
        assert_eq!(summary.dominant_condition, "Clouds");
        assert_eq!(store.lock().count_summaries().unwrap(), 1);
    }
}
