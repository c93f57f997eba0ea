//! Read-only browse filters over readings and summaries.
//!
//! Readings can be filtered by condition and date and searched by
//! condition; summaries by date and dominant condition. Results are always
//! newest first.

use chrono::NaiveDate;
use rusqlite::types::Value;

use crate::store::{day_bounds, format_date};

/// Filter for listing readings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadingQuery {
    /// Exact condition label
    pub condition: Option<String>,
    /// UTC calendar date of the observation
    pub date: Option<NaiveDate>,
    /// Case-insensitive substring of the condition label
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl ReadingQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(condition) = &self.condition {
            clauses.push("condition = ?");
            values.push(Value::Text(condition.clone()));
        }
        if let Some(date) = self.date {
            let (start, end) = day_bounds(date);
            clauses.push("observed_at >= ? AND observed_at < ?");
            values.push(Value::Integer(start));
            values.push(Value::Integer(end));
        }
        if let Some(term) = non_blank(&self.search) {
            clauses.push("instr(lower(condition), lower(?)) > 0");
            values.push(Value::Text(term.to_string()));
        }

        let sql = format!(
            "SELECT id, condition, temperature, feels_like, observed_at
             FROM readings{}
             ORDER BY observed_at DESC, id DESC{}",
            where_clause(&clauses),
            limit_clause(self.limit, &mut values),
        );
        (sql, values)
    }
}

/// Filter for listing daily summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryQuery {
    pub date: Option<NaiveDate>,
    /// Case-insensitive substring of the dominant condition
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl SummaryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(date) = self.date {
            clauses.push("date = ?");
            values.push(Value::Text(format_date(date)));
        }
        if let Some(term) = non_blank(&self.search) {
            clauses.push("instr(lower(dominant_condition), lower(?)) > 0");
            values.push(Value::Text(term.to_string()));
        }

        let sql = format!(
            "SELECT date, avg_temp, max_temp, min_temp, dominant_condition
             FROM daily_summaries{}
             ORDER BY date DESC{}",
            where_clause(&clauses),
            limit_clause(self.limit, &mut values),
        );
        (sql, values)
    }
}

fn non_blank(term: &Option<String>) -> Option<&str> {
    term.as_deref().map(str::trim).filter(|t| !t.is_empty())
}

fn where_clause(clauses: &[&str]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

fn limit_clause(limit: Option<usize>, values: &mut Vec<Value>) -> String {
    match limit {
        Some(n) => {
            values.push(Value::Integer(i64::try_from(n).unwrap_or(i64::MAX)));
            " LIMIT ?".to_string()
        }
        None => String::new(),
    }
}
