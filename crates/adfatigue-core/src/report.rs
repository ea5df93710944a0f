use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use polars::prelude::DataFrame;
use tracing::info;

use crate::error::Result;
use crate::export::{parse_dates, timestamped_file_name, value_counts};
use crate::io::{f64_column, require_columns, sort_order, string_column};
use crate::predictor::PREDICTION_COLUMN;

const TOP_FATIGUED: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct FatiguedCampaign {
    pub campaign_name: String,
    pub score: f64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryReport {
    pub total: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub status_distribution: Vec<(String, usize)>,
    pub most_fatigued: Vec<FatiguedCampaign>,
}

pub fn build_summary(analysis: &DataFrame) -> Result<SummaryReport> {
    require_columns(
        analysis,
        &["date", "campaign_name", PREDICTION_COLUMN, "fatigue_status"],
    )?;
    let dates = parse_dates(analysis)?;
    let names = string_column(analysis, "campaign_name")?;
    let statuses = string_column(analysis, "fatigue_status")?;
    let scores = f64_column(analysis, PREDICTION_COLUMN)?;

    let most_fatigued = sort_order(&scores, false)
        .into_iter()
        .take(TOP_FATIGUED)
        .map(|idx| FatiguedCampaign {
            campaign_name: names[idx].clone().unwrap_or_default(),
            score: scores[idx],
            status: statuses[idx].clone().unwrap_or_default(),
        })
        .collect();

    Ok(SummaryReport {
        total: analysis.height(),
        date_range: dates.iter().min().copied().zip(dates.iter().max().copied()),
        status_distribution: value_counts(statuses.iter().flatten().cloned()),
        most_fatigued,
    })
}

impl SummaryReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("Ad Fatigue Analysis Summary Report\n");
        out.push_str("===============================\n\n");

        out.push_str("Overall Statistics:\n");
        out.push_str("-----------------\n");
        let _ = writeln!(out, "Total Campaigns Analyzed: {}", self.total);
        match self.date_range {
            Some((first, last)) => {
                let _ = writeln!(out, "Date Range: {first} to {last}\n");
            }
            None => out.push_str("Date Range: n/a\n\n"),
        }

        out.push_str("Fatigue Status Distribution:\n");
        out.push_str("-------------------------\n");
        for (status, count) in &self.status_distribution {
            let pct = *count as f64 / self.total.max(1) as f64 * 100.0;
            let _ = writeln!(out, "{status}: {count} campaigns ({pct:.1}%)");
        }
        out.push('\n');

        out.push_str("Top 5 Most Fatigued Campaigns:\n");
        out.push_str("---------------------------\n");
        for campaign in &self.most_fatigued {
            let _ = writeln!(out, "Campaign: {}", campaign.campaign_name);
            let _ = writeln!(out, "Fatigue Score: {:.2}", campaign.score);
            let _ = writeln!(out, "Status: {}\n", campaign.status);
        }

        out
    }
}

/// Writes `fatigue_summary_<timestamp>.txt` into `dir` and returns its path.
pub fn write_summary_report(
    analysis: &DataFrame,
    dir: &Path,
    now: DateTime<Local>,
) -> Result<PathBuf> {
    let report = build_summary(analysis)?;
    fs::create_dir_all(dir)?;
    let path = dir.join(timestamped_file_name("fatigue_summary", "txt", now));
    fs::write(&path, report.render())?;
    info!(path = %path.display(), rows = report.total, "summary report generated");
    Ok(path)
}
