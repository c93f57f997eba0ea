use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest condition label a reading or summary may carry
pub const MAX_CONDITION_LEN: usize = 50;

/// Current conditions as reported by the provider, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Primary condition label, e.g. "Clouds"
    pub condition: String,
    /// Temperature in °C
    pub temp: f64,
    /// Feels-like temperature in °C
    pub feels_like: f64,
    /// Provider observation time
    pub observed_at: DateTime<Utc>,
}

/// One persisted weather observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub condition: String,
    pub temp: f64,
    pub feels_like: f64,
    pub observed_at: DateTime<Utc>,
}

impl Reading {
    pub fn from_observation(id: i64, observation: Observation) -> Self {
        Self {
            id,
            condition: observation.condition,
            temp: observation.temp,
            feels_like: observation.feels_like,
            observed_at: observation.observed_at,
        }
    }

    /// UTC calendar date the reading belongs to
    pub fn date(&self) -> NaiveDate {
        self.observed_at.date_naive()
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {} - {}°C",
            self.condition,
            self.observed_at.format("%Y-%m-%d %H:%M:%S%:z"),
            self.temp
        )
    }
}

/// Rollup of all readings for one calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub avg_temp: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    pub dominant_condition: String,
}

impl fmt::Display for DailySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Summary for {} - Avg: {}°C", self.date, self.avg_temp)
    }
}
