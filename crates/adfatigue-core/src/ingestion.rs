use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use adfatigue_parser::{write_raw_performance, RawCampaignRecord};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use tracing::info;

use crate::error::{PipelineError, Result};

const MICROS_PER_UNIT: f64 = 1_000_000.0;
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Inclusive calendar range of a platform query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn trailing(end: NaiveDate, days: i64) -> Self {
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// One campaign-day row as the ads platform reports it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlatformRow {
    #[serde(rename = "segments.date")]
    pub date: NaiveDate,
    #[serde(rename = "campaign.id")]
    pub campaign_id: String,
    #[serde(rename = "campaign.name")]
    pub campaign_name: String,
    #[serde(rename = "metrics.impressions")]
    pub impressions: f64,
    #[serde(rename = "metrics.clicks")]
    pub clicks: f64,
    #[serde(rename = "metrics.cost_micros")]
    pub cost_micros: f64,
    #[serde(rename = "metrics.conversions")]
    pub conversions: f64,
    #[serde(rename = "metrics.conversions_value")]
    pub conversion_value: f64,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

impl From<&PlatformRow> for RawCampaignRecord {
    fn from(row: &PlatformRow) -> Self {
        let cost = row.cost_micros / MICROS_PER_UNIT;
        RawCampaignRecord {
            date: row.date,
            campaign_id: row.campaign_id.clone(),
            campaign_name: Some(row.campaign_name.clone()),
            impressions: Some(row.impressions),
            clicks: Some(row.clicks),
            cost: Some(cost),
            conversions: Some(row.conversions),
            conversion_value: Some(row.conversion_value),
            ctr: Some(ratio(row.clicks, row.impressions) * 100.0),
            conversion_rate: Some(ratio(row.conversions, row.clicks) * 100.0),
            cpc: Some(ratio(cost, row.clicks)),
            cpa: Some(ratio(cost, row.conversions)),
            roas: Some(ratio(row.conversion_value, cost)),
        }
    }
}

/// Boundary to the advertising platform. Authentication happens out of band.
pub trait CampaignSource {
    fn name(&self) -> &'static str;
    fn fetch(&self, account_id: &str, window: DateWindow) -> Result<Vec<PlatformRow>>;
}

/// Reads a report the platform exported to CSV (platform column names).
#[derive(Debug, Clone)]
pub struct PlatformExportSource {
    pub path: PathBuf,
}

impl CampaignSource for PlatformExportSource {
    fn name(&self) -> &'static str {
        "platform_export"
    }

    fn fetch(&self, _account_id: &str, window: DateWindow) -> Result<Vec<PlatformRow>> {
        if !self.path.exists() {
            return Err(PipelineError::MissingInput {
                stage: "ingest",
                path: self.path.clone(),
            });
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut rows = Vec::new();
        for row in reader.deserialize::<PlatformRow>() {
            let row = row?;
            if window.contains(row.date) {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestionSummary {
    pub records: usize,
    pub campaigns: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// Fetches the window from `source` and writes the raw performance table.
/// Nothing is written when the fetch fails.
pub fn ingest(
    source: &dyn CampaignSource,
    account_id: &str,
    window: DateWindow,
    output: &Path,
) -> Result<IngestionSummary> {
    if account_id.trim().is_empty() {
        return Err(PipelineError::Config(
            "an ads account id is required for ingestion".to_string(),
        ));
    }

    let mut rows = source.fetch(account_id, window)?;
    // platform reports arrive newest first
    rows.sort_by(|a, b| b.date.cmp(&a.date));

    let records: Vec<RawCampaignRecord> = rows.iter().map(RawCampaignRecord::from).collect();

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    write_raw_performance(output, &records)?;

    let campaigns: HashSet<&str> = records.iter().map(|r| r.campaign_id.as_str()).collect();
    let summary = IngestionSummary {
        records: records.len(),
        campaigns: campaigns.len(),
        first_date: records.iter().map(|r| r.date).min(),
        last_date: records.iter().map(|r| r.date).max(),
    };

    info!(
        source = source.name(),
        records = summary.records,
        campaigns = summary.campaigns,
        first_date = ?summary.first_date,
        last_date = ?summary.last_date,
        path = %output.display(),
        "raw performance data written"
    );

    Ok(summary)
}
