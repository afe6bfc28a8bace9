//! Trend view over the fixed lab-result series.

use crate::error::ValidationError;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cholesterol,
    Glucose,
    Tsh,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Cholesterol, Metric::Glucose, Metric::Tsh];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Cholesterol => "Cholesterol",
            Metric::Glucose => "Glucose",
            Metric::Tsh => "TSH",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Metric::Cholesterol => "cholesterol",
            Metric::Glucose => "glucose",
            Metric::Tsh => "tsh",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown metric '{}' (expected cholesterol, glucose or tsh)", s))
    }
}

/// One row of the series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendSample {
    pub date: NaiveDate,
    pub cholesterol: f64,
    pub glucose: f64,
    pub tsh: f64,
}

impl TrendSample {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cholesterol => self.cholesterol,
            Metric::Glucose => self.glucose,
            Metric::Tsh => self.tsh,
        }
    }
}

const SERIES: [(i32, u32, f64, f64, f64); 6] = [
    (2023, 1, 180.0, 95.0, 2.5),
    (2023, 2, 190.0, 100.0, 2.7),
    (2023, 3, 185.0, 98.0, 2.6),
    (2023, 4, 195.0, 102.0, 2.8),
    (2023, 5, 188.0, 97.0, 2.5),
    (2023, 6, 192.0, 99.0, 2.7),
];

/// The fixed series, oldest first.
pub fn fixed_series() -> Vec<TrendSample> {
    SERIES
        .iter()
        .filter_map(|&(year, month, cholesterol, glucose, tsh)| {
            NaiveDate::from_ymd_opt(year, month, 1).map(|date| TrendSample {
                date,
                cholesterol,
                glucose,
                tsh,
            })
        })
        .collect()
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, ValidationError> {
        if from > to {
            return Err(ValidationError::InvalidDateRange);
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// A point of the projected series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Rows within `range`; everything when there is no range.
pub fn filter_series(series: &[TrendSample], range: Option<DateRange>) -> Vec<TrendSample> {
    series
        .iter()
        .filter(|s| range.map_or(true, |r| r.contains(s.date)))
        .copied()
        .collect()
}

/// Rows within `range`, projected onto `metric`.
pub fn project(series: &[TrendSample], metric: Metric, range: Option<DateRange>) -> Vec<TrendPoint> {
    filter_series(series, range)
        .into_iter()
        .map(|s| TrendPoint {
            date: s.date,
            value: s.value(metric),
        })
        .collect()
}

/// State of the dashboard chart.
#[derive(Debug, Clone)]
pub struct TrendView {
    series: Vec<TrendSample>,
    metric: Metric,
    range: Option<DateRange>,
}

impl Default for TrendView {
    fn default() -> Self {
        Self::new()
    }
}

impl TrendView {
    pub fn new() -> Self {
        Self {
            series: fixed_series(),
            metric: Metric::Cholesterol,
            range: None,
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn set_metric(&mut self, metric: Metric) {
        self.metric = metric;
    }

    pub fn set_range(&mut self, range: Option<DateRange>) {
        self.range = range;
    }

    pub fn points(&self) -> Vec<TrendPoint> {
        project(&self.series, self.metric, self.range)
    }

    pub fn title(&self) -> String {
        format!("{} Trend", self.metric.label())
    }

    /// Filtered rows as pretty JSON, for the export action.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&filter_series(&self.series, self.range))
    }
}
