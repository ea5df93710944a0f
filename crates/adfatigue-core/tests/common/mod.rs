#![allow(dead_code)]

use adfatigue_parser::{build_raw_dataframe, RawCampaignRecord};
use chrono::{Duration, NaiveDate};
use polars::prelude::DataFrame;

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

pub fn record(
    day: i64,
    campaign_id: &str,
    impressions: f64,
    clicks: f64,
    conversions: f64,
) -> RawCampaignRecord {
    let cost = clicks * 0.5;
    let conversion_value = conversions * 40.0;
    let ratio = |a: f64, b: f64| if b > 0.0 { a / b } else { 0.0 };
    RawCampaignRecord {
        date: start_date() + Duration::days(day),
        campaign_id: campaign_id.to_string(),
        campaign_name: Some(format!("Campaign {campaign_id}")),
        impressions: Some(impressions),
        clicks: Some(clicks),
        cost: Some(cost),
        conversions: Some(conversions),
        conversion_value: Some(conversion_value),
        ctr: Some(ratio(clicks, impressions) * 100.0),
        conversion_rate: Some(ratio(conversions, clicks) * 100.0),
        cpc: Some(ratio(cost, clicks)),
        cpa: Some(ratio(cost, conversions)),
        roas: Some(ratio(conversion_value, cost)),
    }
}

/// Campaign-day rows for `campaigns` campaigns over `days` days. Even
/// campaigns decay steadily, odd campaigns stay flat with a small wobble.
pub fn synthetic_records(campaigns: usize, days: i64) -> Vec<RawCampaignRecord> {
    let mut records = Vec::new();
    for c in 0..campaigns {
        let id = (1000 + c).to_string();
        for day in 0..days {
            let impressions = 1000.0 + (c as f64) * 50.0 + ((day % 3) as f64) * 10.0;
            let ctr = if c % 2 == 0 {
                (6.0 - 0.15 * day as f64).max(0.5)
            } else {
                4.0 + 0.1 * ((day % 4) as f64)
            };
            let clicks = (impressions * ctr / 100.0).round();
            let conversions = (clicks * if c % 2 == 0 { 0.08 } else { 0.05 }).round();
            records.push(record(day, &id, impressions, clicks, conversions));
        }
    }
    records
}

pub fn synthetic_frame(campaigns: usize, days: i64) -> DataFrame {
    build_raw_dataframe(&synthetic_records(campaigns, days)).unwrap()
}
