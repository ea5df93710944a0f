use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::Serialize;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column order of the raw performance table as written by ingestion.
pub const RAW_COLUMNS: [&str; 13] = [
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
];

/// Raw and ratio metrics, in the fixed order used for imputation and clipping.
pub const NUMERIC_COLUMNS: [&str; 10] = [
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
];

/// One campaign-day row of the raw performance table. Metric cells may be
/// missing; the cleaner imputes them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawCampaignRecord {
    pub date: NaiveDate,
    pub campaign_id: String,
    pub campaign_name: Option<String>,
    pub impressions: Option<f64>,
    pub clicks: Option<f64>,
    pub cost: Option<f64>,
    pub conversions: Option<f64>,
    pub conversion_value: Option<f64>,
    pub ctr: Option<f64>,
    pub conversion_rate: Option<f64>,
    pub cpc: Option<f64>,
    pub cpa: Option<f64>,
    pub roas: Option<f64>,
}

impl RawCampaignRecord {
    fn metric(&self, column: &str) -> Option<f64> {
        match column {
            "impressions" => self.impressions,
            "clicks" => self.clicks,
            "cost" => self.cost,
            "conversions" => self.conversions,
            "conversion_value" => self.conversion_value,
            "ctr" => self.ctr,
            "conversion_rate" => self.conversion_rate,
            "cpc" => self.cpc,
            "cpa" => self.cpa,
            "roas" => self.roas,
            _ => None,
        }
    }
}

/// Accepts ISO dates, ISO timestamps (the time part is dropped) and slash-separated dates.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y/%m/%d") {
        return Some(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(ts.date());
        }
    }
    None
}

pub fn build_raw_dataframe(records: &[RawCampaignRecord]) -> PolarsResult<DataFrame> {
    let dates: Vec<String> = records
        .iter()
        .map(|record| record.date.format(DATE_FORMAT).to_string())
        .collect();
    let ids: Vec<&str> = records.iter().map(|r| r.campaign_id.as_str()).collect();
    let names: Vec<Option<&str>> = records
        .iter()
        .map(|r| r.campaign_name.as_deref())
        .collect();

    let mut columns: Vec<Column> = vec![
        Series::new("date".into(), dates).into(),
        Series::new("campaign_id".into(), ids).into(),
        Series::new("campaign_name".into(), names).into(),
    ];

    for name in NUMERIC_COLUMNS {
        let values: Vec<Option<f64>> = records.iter().map(|r| r.metric(name)).collect();
        columns.push(Series::new(name.into(), values).into());
    }

    DataFrame::new(columns)
}
