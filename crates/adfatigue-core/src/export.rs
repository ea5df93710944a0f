use std::collections::{BTreeMap, HashSet};
use std::fmt;

use adfatigue_parser::parse_date;
use chrono::{DateTime, Datelike, Local, NaiveDate, Weekday};
use polars::prelude::*;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::io::{bool_column, optional_f64_column, require_columns, string_column};
use crate::predictor::PREDICTION_COLUMN;

pub const TABLEAU_COLUMNS: [&str; 11] = [
    "date",
    "year",
    "month",
    "day",
    "day_of_week",
    "campaign_id",
    "campaign_name",
    "predicted_fatigue_score",
    "fatigue_flag",
    "fatigue_status",
    "fatigue_severity",
];

/// Ordered severity bins over the predicted score. Bins are right-closed:
/// Critical (-inf, -100], High (-100, -50], Medium (-50, -25], Low (-25, 0],
/// Healthy (0, inf).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FatigueSeverity {
    Critical,
    High,
    Medium,
    Low,
    Healthy,
}

impl FatigueSeverity {
    /// `None` for NaN scores.
    pub fn from_score(score: f64) -> Option<Self> {
        if score.is_nan() {
            None
        } else if score <= -100.0 {
            Some(FatigueSeverity::Critical)
        } else if score <= -50.0 {
            Some(FatigueSeverity::High)
        } else if score <= -25.0 {
            Some(FatigueSeverity::Medium)
        } else if score <= 0.0 {
            Some(FatigueSeverity::Low)
        } else {
            Some(FatigueSeverity::Healthy)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FatigueSeverity::Critical => "Critical",
            FatigueSeverity::High => "High",
            FatigueSeverity::Medium => "Medium",
            FatigueSeverity::Low => "Low",
            FatigueSeverity::Healthy => "Healthy",
        }
    }
}

impl fmt::Display for FatigueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// `<prefix>_YYYYmmdd_HHMMSS.<extension>`
pub fn timestamped_file_name(prefix: &str, extension: &str, now: DateTime<Local>) -> String {
    format!("{prefix}_{}.{extension}", now.format("%Y%m%d_%H%M%S"))
}

pub(crate) fn parse_dates(df: &DataFrame) -> Result<Vec<NaiveDate>> {
    string_column(df, "date")?
        .into_iter()
        .enumerate()
        .map(|(idx, value)| {
            value.as_deref().and_then(parse_date).ok_or_else(|| {
                PipelineError::Computation(format!("row {idx}: unparseable date {value:?}"))
            })
        })
        .collect()
}

/// Reshapes the fatigue analysis for visualization: calendar columns, the
/// severity bucket and the fixed Tableau column order.
pub fn prepare_tableau_data(analysis: &DataFrame) -> Result<DataFrame> {
    require_columns(
        analysis,
        &[
            "date",
            "campaign_id",
            "campaign_name",
            PREDICTION_COLUMN,
            "fatigue_flag",
            "fatigue_status",
        ],
    )?;

    let dates = parse_dates(analysis)?;
    let scores = optional_f64_column(analysis, PREDICTION_COLUMN)?;

    let years: Vec<i32> = dates.iter().map(|d| d.year()).collect();
    let months: Vec<i32> = dates.iter().map(|d| d.month() as i32).collect();
    let days: Vec<i32> = dates.iter().map(|d| d.day() as i32).collect();
    let weekdays: Vec<&str> = dates.iter().map(|d| weekday_name(d.weekday())).collect();
    let severities: Vec<Option<&str>> = scores
        .iter()
        .map(|score| score.and_then(FatigueSeverity::from_score).map(|s| s.as_str()))
        .collect();
    let flags = bool_column(analysis, "fatigue_flag")?;

    let columns: Vec<Column> = vec![
        analysis.column("date")?.cast(&DataType::String)?,
        Series::new("year".into(), years).into(),
        Series::new("month".into(), months).into(),
        Series::new("day".into(), days).into(),
        Series::new("day_of_week".into(), weekdays).into(),
        analysis.column("campaign_id")?.cast(&DataType::String)?,
        analysis.column("campaign_name")?.cast(&DataType::String)?,
        Series::new(PREDICTION_COLUMN.into(), scores).into(),
        Series::new("fatigue_flag".into(), flags).into(),
        analysis.column("fatigue_status")?.cast(&DataType::String)?,
        Series::new("fatigue_severity".into(), severities).into(),
    ];

    Ok(DataFrame::new(columns)?)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub records: usize,
    pub campaigns: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Status labels ordered by descending count.
    pub status_counts: Vec<(String, usize)>,
    pub severity_counts: BTreeMap<FatigueSeverity, usize>,
}

/// Descending by count, ties by label.
pub(crate) fn value_counts(values: impl IntoIterator<Item = String>) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    let mut ordered: Vec<(String, usize)> = counts.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ordered
}

pub fn summarize_export(tableau: &DataFrame) -> Result<ExportSummary> {
    let dates = parse_dates(tableau)?;
    let ids = string_column(tableau, "campaign_id")?;
    let statuses = string_column(tableau, "fatigue_status")?;
    let scores = optional_f64_column(tableau, PREDICTION_COLUMN)?;

    let campaigns: HashSet<&str> = ids.iter().flatten().map(String::as_str).collect();
    let date_range = dates
        .iter()
        .min()
        .copied()
        .zip(dates.iter().max().copied());

    let mut severity_counts = BTreeMap::new();
    for severity in scores.iter().filter_map(|s| s.and_then(FatigueSeverity::from_score)) {
        *severity_counts.entry(severity).or_insert(0) += 1;
    }

    Ok(ExportSummary {
        records: tableau.height(),
        campaigns: campaigns.len(),
        date_range,
        status_counts: value_counts(statuses.into_iter().flatten()),
        severity_counts,
    })
}
