use std::cmp::Ordering;
use std::collections::HashSet;

use adfatigue_parser::{parse_date, DATE_FORMAT, NUMERIC_COLUMNS, RAW_COLUMNS};
use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{debug, info};

use crate::config::CleaningConfig;
use crate::error::{PipelineError, Result};
use crate::io::{optional_f64_column, require_columns, string_column};

pub const UNKNOWN_CAMPAIGN: &str = "Unknown Campaign";
pub const TARGET_COLUMN: &str = "fatigue_score";
pub const IDENTIFIER_COLUMNS: [&str; 3] = ["campaign_id", "campaign_name", "date"];

const ROLLING_METRICS: [&str; 4] = ["impressions", "clicks", "ctr", "conversion_rate"];
const CHANGE_METRICS: [&str; 2] = ["ctr", "conversion_rate"];

/// Column layout of the cleaned (train) table.
pub const CLEANED_COLUMNS: [&str; 21] = [
    "date",
    "campaign_id",
    "campaign_name",
    "impressions",
    "clicks",
    "cost",
    "conversions",
    "conversion_value",
    "ctr",
    "conversion_rate",
    "cpc",
    "cpa",
    "roas",
    "impressions_7d_avg",
    "clicks_7d_avg",
    "ctr_7d_avg",
    "conversion_rate_7d_avg",
    "ctr_change",
    "conversion_rate_change",
    "fatigue_score",
    "campaign_age",
];

/// Model inputs: every cleaned column except identifiers and the target.
pub const FEATURE_COLUMNS: [&str; 17] = [
    "impressions",
    "clicks",
    "cost",
    "conversions",
    "conversion_value",
    "ctr",
    "conversion_rate",
    "cpc",
    "cpa",
    "roas",
    "impressions_7d_avg",
    "clicks_7d_avg",
    "ctr_7d_avg",
    "conversion_rate_7d_avg",
    "ctr_change",
    "conversion_rate_change",
    "campaign_age",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleaningOptions {
    pub rolling_window: usize,
    pub fatigue_lag: usize,
    pub clip_sigma: f64,
}

impl Default for CleaningOptions {
    fn default() -> Self {
        Self::from(&CleaningConfig::default())
    }
}

impl From<&CleaningConfig> for CleaningOptions {
    fn from(config: &CleaningConfig) -> Self {
        Self {
            rolling_window: config.rolling_window,
            fatigue_lag: config.fatigue_lag,
            clip_sigma: config.clip_sigma,
        }
    }
}

/// Trailing mean over at most `window` values; short history uses what exists.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (idx, value) in values.iter().enumerate() {
        sum += value;
        if idx >= window {
            sum -= values[idx - window];
        }
        let count = (idx + 1).min(window);
        out.push(sum / count as f64);
    }
    out
}

/// `cur / prev - 1` against the previous row; the first row and any
/// non-finite result become 0.
pub fn relative_change(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for idx in 0..values.len() {
        if idx == 0 {
            out.push(0.0);
            continue;
        }
        let change = values[idx] / values[idx - 1] - 1.0;
        out.push(finite_or_zero(change));
    }
    out
}

/// Average percentage decline of the two rolling averages versus `lag` rows
/// earlier. Positive means the metrics dropped. Rows without `lag` rows of
/// history, or whose reference value is zero, score 0.
pub fn fatigue_scores(ctr_avg: &[f64], conversion_rate_avg: &[f64], lag: usize) -> Vec<f64> {
    let len = ctr_avg.len().min(conversion_rate_avg.len());
    (0..len)
        .map(|idx| {
            if lag == 0 || idx < lag {
                return 0.0;
            }
            let ctr_decline = decline_pct(ctr_avg[idx - lag], ctr_avg[idx]);
            let cr_decline = decline_pct(conversion_rate_avg[idx - lag], conversion_rate_avg[idx]);
            finite_or_zero((ctr_decline + cr_decline) / 2.0)
        })
        .collect()
}

fn decline_pct(reference: f64, current: f64) -> f64 {
    (reference - current) / reference * 100.0
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// `[mean - sigma·std, mean + sigma·std]` with the sample standard deviation.
/// `None` when the bounds are undefined (fewer than two values).
pub fn clip_bounds(values: &[f64], sigma: f64) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = variance.sqrt();
    if !mean.is_finite() || !std.is_finite() {
        return None;
    }
    Some((mean - sigma * std, mean + sigma * std))
}

/// Numeric identifiers sort numerically ahead of free-form ones.
fn campaign_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

struct RawColumns {
    dates: Vec<NaiveDate>,
    ids: Vec<String>,
    names: Vec<Option<String>>,
    metrics: Vec<Vec<Option<f64>>>,
}

fn extract_raw_columns(raw: &DataFrame) -> Result<RawColumns> {
    require_columns(raw, &RAW_COLUMNS)?;

    let dates = string_column(raw, "date")?
        .into_iter()
        .enumerate()
        .map(|(idx, value)| {
            value
                .as_deref()
                .and_then(parse_date)
                .ok_or_else(|| PipelineError::Computation(format!("row {idx}: unparseable date {value:?}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let ids = string_column(raw, "campaign_id")?
        .into_iter()
        .enumerate()
        .map(|(idx, value)| {
            value
                .filter(|id| !id.trim().is_empty())
                .ok_or_else(|| PipelineError::Computation(format!("row {idx}: missing campaign_id")))
        })
        .collect::<Result<Vec<_>>>()?;

    let names = string_column(raw, "campaign_name")?;

    let metrics = NUMERIC_COLUMNS
        .iter()
        .map(|name| optional_f64_column(raw, name))
        .collect::<Result<Vec<_>>>()?;

    Ok(RawColumns {
        dates,
        ids,
        names,
        metrics,
    })
}

/// Builds the derived campaign-day table from raw performance rows.
///
/// Rows are sorted by (campaign_id, date), duplicates on that key are
/// dropped keeping the first, gaps are imputed, then per-campaign rolling
/// averages, relative changes, the fatigue score and campaign age are derived.
/// The ten raw metrics are clipped last, each against bounds taken from its
/// own unclipped values, in `NUMERIC_COLUMNS` order.
pub fn clean_campaign_data(raw: &DataFrame, options: &CleaningOptions) -> Result<DataFrame> {
    let columns = extract_raw_columns(raw)?;
    let input_rows = columns.ids.len();

    let mut order: Vec<usize> = (0..input_rows).collect();
    order.sort_by(|&a, &b| {
        campaign_order(&columns.ids[a], &columns.ids[b])
            .then_with(|| columns.dates[a].cmp(&columns.dates[b]))
    });

    let mut seen: HashSet<(&str, NaiveDate)> = HashSet::with_capacity(input_rows);
    order.retain(|&idx| seen.insert((columns.ids[idx].as_str(), columns.dates[idx])));
    let duplicates = input_rows - order.len();
    let len = order.len();

    let dates: Vec<NaiveDate> = order.iter().map(|&i| columns.dates[i]).collect();
    let ids: Vec<&str> = order.iter().map(|&i| columns.ids[i].as_str()).collect();
    let names: Vec<&str> = order
        .iter()
        .map(|&i| columns.names[i].as_deref().unwrap_or(UNKNOWN_CAMPAIGN))
        .collect();
    let mut metrics: Vec<Vec<f64>> = columns
        .metrics
        .iter()
        .map(|values| {
            order
                .iter()
                .map(|&i| values[i].filter(|v| !v.is_nan()).unwrap_or(0.0))
                .collect()
        })
        .collect();

    let metric_index = |name: &str| NUMERIC_COLUMNS.iter().position(|c| *c == name);

    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    for idx in 1..=len {
        if idx == len || ids[idx] != ids[start] {
            groups.push((start, idx));
            start = idx;
        }
    }

    let mut rolling: Vec<Vec<f64>> = vec![Vec::with_capacity(len); ROLLING_METRICS.len()];
    let mut changes: Vec<Vec<f64>> = vec![Vec::with_capacity(len); CHANGE_METRICS.len()];
    let mut fatigue = Vec::with_capacity(len);
    let mut campaign_age: Vec<i64> = Vec::with_capacity(len);

    for &(group_start, group_end) in &groups {
        for (slot, metric) in ROLLING_METRICS.iter().enumerate() {
            let source = metric_index(metric).map(|m| &metrics[m][group_start..group_end]);
            if let Some(values) = source {
                rolling[slot].extend(rolling_mean(values, options.rolling_window));
            }
        }
        for (slot, metric) in CHANGE_METRICS.iter().enumerate() {
            if let Some(m) = metric_index(metric) {
                changes[slot].extend(relative_change(&metrics[m][group_start..group_end]));
            }
        }

        let ctr_avg = &rolling[2][group_start..group_end];
        let cr_avg = &rolling[3][group_start..group_end];
        fatigue.extend(fatigue_scores(ctr_avg, cr_avg, options.fatigue_lag));

        let first_date = dates[group_start];
        campaign_age.extend(
            dates[group_start..group_end]
                .iter()
                .map(|date| (*date - first_date).num_days()),
        );
    }

    for (name, values) in NUMERIC_COLUMNS.iter().zip(metrics.iter_mut()) {
        if let Some((lower, upper)) = clip_bounds(values, options.clip_sigma) {
            let mut clipped = 0usize;
            for value in values.iter_mut() {
                let bounded = value.clamp(lower, upper);
                if bounded != *value {
                    clipped += 1;
                    *value = bounded;
                }
            }
            debug!(column = *name, lower, upper, clipped, "clipped outliers");
        }
    }

    let date_strings: Vec<String> = dates
        .iter()
        .map(|date| date.format(DATE_FORMAT).to_string())
        .collect();

    let mut frame_columns: Vec<Column> = vec![
        Series::new("date".into(), date_strings).into(),
        Series::new("campaign_id".into(), ids).into(),
        Series::new("campaign_name".into(), names).into(),
    ];
    for (name, values) in NUMERIC_COLUMNS.iter().zip(metrics) {
        frame_columns.push(Series::new((*name).into(), values).into());
    }
    for (metric, values) in ROLLING_METRICS.iter().zip(rolling) {
        frame_columns.push(Series::new(format!("{metric}_7d_avg").into(), values).into());
    }
    for (metric, values) in CHANGE_METRICS.iter().zip(changes) {
        frame_columns.push(Series::new(format!("{metric}_change").into(), values).into());
    }
    frame_columns.push(Series::new(TARGET_COLUMN.into(), fatigue).into());
    frame_columns.push(Series::new("campaign_age".into(), campaign_age).into());

    let cleaned = DataFrame::new(frame_columns)?;

    info!(
        input_rows,
        duplicates,
        rows = cleaned.height(),
        campaigns = groups.len(),
        "cleaned campaign data"
    );

    Ok(cleaned)
}
