use adfatigue_core::error::{ExternalServiceError, ServiceFailure};
use adfatigue_core::ingestion::{
    ingest, CampaignSource, DateWindow, PlatformExportSource, PlatformRow,
};
use adfatigue_core::{PipelineError, Result};
use adfatigue_parser::{read_raw_performance, RawCampaignRecord};
use chrono::NaiveDate;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
}

fn platform_row(date: NaiveDate, id: &str, clicks: f64) -> PlatformRow {
    PlatformRow {
        date,
        campaign_id: id.to_string(),
        campaign_name: format!("Campaign {id}"),
        impressions: 2000.0,
        clicks,
        cost_micros: 50_000_000.0,
        conversions: 4.0,
        conversion_value: 200.0,
    }
}

struct StaticSource(Vec<PlatformRow>);

impl CampaignSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    fn fetch(&self, _account_id: &str, window: DateWindow) -> Result<Vec<PlatformRow>> {
        Ok(self
            .0
            .iter()
            .filter(|row| window.contains(row.date))
            .cloned()
            .collect())
    }
}

struct FailingSource;

impl CampaignSource for FailingSource {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn fetch(&self, _account_id: &str, _window: DateWindow) -> Result<Vec<PlatformRow>> {
        Err(ExternalServiceError {
            request_id: "req-123".to_string(),
            status: "PERMISSION_DENIED".to_string(),
            failures: vec![ServiceFailure {
                message: "customer not enabled".to_string(),
                field_paths: vec!["customer_id".to_string()],
            }],
        }
        .into())
    }
}

#[test]
fn platform_rows_become_raw_records() {
    let record = RawCampaignRecord::from(&platform_row(day(1), "77", 100.0));
    assert_eq!(record.cost, Some(50.0));
    assert_eq!(record.ctr, Some(5.0));
    assert_eq!(record.conversion_rate, Some(4.0));
    assert_eq!(record.cpc, Some(0.5));
    assert_eq!(record.cpa, Some(12.5));
    assert_eq!(record.roas, Some(4.0));

    let zero_clicks = RawCampaignRecord::from(&platform_row(day(1), "77", 0.0));
    assert_eq!(zero_clicks.conversion_rate, Some(0.0));
    assert_eq!(zero_clicks.cpc, Some(0.0));
}

#[test]
fn trailing_window_is_inclusive() {
    let window = DateWindow::trailing(day(29), 28);
    assert_eq!(window.start, day(1));
    assert!(window.contains(day(1)));
    assert!(window.contains(day(29)));
    assert!(!window.contains(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()));
}

#[test]
fn ingest_writes_window_newest_first() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("raw/campaign_performance.csv");
    let source = StaticSource(vec![
        platform_row(day(2), "1", 80.0),
        platform_row(day(5), "1", 90.0),
        platform_row(day(3), "2", 70.0),
        platform_row(day(20), "2", 70.0),
    ]);

    let summary = ingest(&source, "123-456-7890", DateWindow::trailing(day(10), 9), &output)?;
    assert_eq!(summary.records, 3);
    assert_eq!(summary.campaigns, 2);
    assert_eq!(summary.first_date, Some(day(2)));
    assert_eq!(summary.last_date, Some(day(5)));

    let raw = read_raw_performance(&output)?;
    assert_eq!(raw.height(), 3);
    let dates = raw.column("date")?.cast(&polars::prelude::DataType::String)?;
    assert_eq!(dates.str()?.get(0), Some("2024-02-05"));
    Ok(())
}

#[test]
fn failed_fetch_writes_nothing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("raw.csv");

    let err = ingest(&FailingSource, "123", DateWindow::trailing(day(10), 9), &output).unwrap_err();
    assert!(matches!(err, PipelineError::ExternalService(_)));
    let message = err.to_string();
    assert!(message.contains("req-123"));
    assert!(message.contains("PERMISSION_DENIED"));
    assert!(message.contains("on field: customer_id"));
    assert!(!output.exists());
    Ok(())
}

#[test]
fn account_id_is_required() {
    let source = StaticSource(Vec::new());
    let err = ingest(&source, "  ", DateWindow::trailing(day(10), 9), std::path::Path::new("unused.csv"))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}

#[test]
fn platform_export_source_reads_report_columns() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let export = dir.path().join("export.csv");
    std::fs::write(
        &export,
        "segments.date,campaign.id,campaign.name,metrics.impressions,metrics.clicks,metrics.cost_micros,metrics.conversions,metrics.conversions_value\n\
         2024-02-03,55,Winter,1000,20,10000000,1,30\n\
         2023-12-01,55,Winter,1000,20,10000000,1,30\n",
    )?;

    let source = PlatformExportSource { path: export };
    let rows = source.fetch("55", DateWindow::trailing(day(10), 30))?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].campaign_name, "Winter");
    assert_eq!(rows[0].cost_micros, 10_000_000.0);
    Ok(())
}

#[test]
fn service_error_lists_every_failure() {
    let err = ExternalServiceError {
        request_id: "req-9".to_string(),
        status: "INVALID_ARGUMENT".to_string(),
        failures: vec![
            ServiceFailure {
                message: "bad date range".to_string(),
                field_paths: vec!["segments.date".to_string(), "query".to_string()],
            },
            ServiceFailure {
                message: "quota exceeded".to_string(),
                field_paths: Vec::new(),
            },
        ],
    };
    assert_eq!(
        err.to_string(),
        "request \"req-9\" failed with status \"INVALID_ARGUMENT\"; bad date range (on field: segments.date, query); quota exceeded"
    );

    let bare = ExternalServiceError {
        request_id: "req-10".to_string(),
        status: "INTERNAL".to_string(),
        failures: Vec::new(),
    };
    assert_eq!(bare.to_string(), "request \"req-10\" failed with status \"INTERNAL\"");
}
