use adfatigue_core::classifier::{detect_ad_fatigue, is_fatigued, FatigueStatus, DEFAULT_THRESHOLD};
use adfatigue_core::export::{
    prepare_tableau_data, summarize_export, timestamped_file_name, FatigueSeverity,
    TABLEAU_COLUMNS,
};
use adfatigue_core::io::f64_column;
use adfatigue_core::report::{build_summary, write_summary_report};
use anyhow::Result;
use chrono::{Local, NaiveDate, TimeZone};
use polars::prelude::*;

fn predictions() -> DataFrame {
    df!(
        "campaign_id" => &["1", "2", "3", "4", "5"],
        "campaign_name" => &["Alpha", "Beta", "Gamma", "Delta", "Eps"],
        "date" => &["2024-03-04", "2024-03-01", "2024-03-02", "2024-03-03", "2024-03-05"],
        "predicted_fatigue_score" => &[-120.0f64, -70.0, -69.0, 10.0, -70.5],
    )
    .unwrap()
}

#[test]
fn threshold_is_exclusive() {
    assert!(is_fatigued(-70.5, DEFAULT_THRESHOLD));
    assert!(!is_fatigued(-70.0, DEFAULT_THRESHOLD));
    assert!(!is_fatigued(15.0, DEFAULT_THRESHOLD));
    assert_eq!(FatigueStatus::from_flag(true).as_str(), "FATIGUED");
    assert_eq!(FatigueStatus::from_flag(false).to_string(), "HEALTHY");
}

#[test]
fn detection_flags_and_sorts_descending() -> Result<()> {
    let analysis = detect_ad_fatigue(&predictions(), DEFAULT_THRESHOLD)?;

    let scores = f64_column(&analysis, "predicted_fatigue_score")?;
    assert_eq!(scores, vec![10.0, -69.0, -70.0, -70.5, -120.0]);

    let flags: Vec<Option<bool>> = analysis.column("fatigue_flag")?.bool()?.into_iter().collect();
    assert_eq!(
        flags,
        vec![Some(false), Some(false), Some(false), Some(true), Some(true)]
    );

    let statuses: Vec<Option<&str>> = analysis.column("fatigue_status")?.str()?.into_iter().collect();
    assert_eq!(statuses[2], Some("HEALTHY"));
    assert_eq!(statuses[3], Some("FATIGUED"));
    Ok(())
}

#[test]
fn custom_threshold_changes_flags() -> Result<()> {
    let analysis = detect_ad_fatigue(&predictions(), 0.0)?;
    let flagged = analysis
        .column("fatigue_flag")?
        .bool()?
        .into_iter()
        .filter(|flag| *flag == Some(true))
        .count();
    assert_eq!(flagged, 4);
    Ok(())
}

#[test]
fn severity_bins_are_right_closed() {
    assert_eq!(FatigueSeverity::from_score(-100.0), Some(FatigueSeverity::Critical));
    assert_eq!(FatigueSeverity::from_score(-99.9), Some(FatigueSeverity::High));
    assert_eq!(FatigueSeverity::from_score(-50.0), Some(FatigueSeverity::High));
    assert_eq!(FatigueSeverity::from_score(-25.0), Some(FatigueSeverity::Medium));
    assert_eq!(FatigueSeverity::from_score(0.0), Some(FatigueSeverity::Low));
    assert_eq!(FatigueSeverity::from_score(0.1), Some(FatigueSeverity::Healthy));
    assert_eq!(FatigueSeverity::from_score(f64::NAN), None);
}

#[test]
fn tableau_frame_has_calendar_and_severity_columns() -> Result<()> {
    let analysis = detect_ad_fatigue(&predictions(), DEFAULT_THRESHOLD)?;
    let tableau = prepare_tableau_data(&analysis)?;

    let names: Vec<&str> = tableau
        .get_column_names()
        .into_iter()
        .map(|name| name.as_str())
        .collect();
    assert_eq!(names, TABLEAU_COLUMNS.to_vec());

    // first row after sorting: Delta, 2024-03-03, a Sunday
    let day_of_week = tableau.column("day_of_week")?.str()?;
    assert_eq!(day_of_week.get(0), Some("Sunday"));
    assert_eq!(tableau.column("year")?.i32()?.get(0), Some(2024));
    assert_eq!(tableau.column("month")?.i32()?.get(0), Some(3));
    assert_eq!(tableau.column("day")?.i32()?.get(0), Some(3));

    let severity: Vec<Option<&str>> = tableau.column("fatigue_severity")?.str()?.into_iter().collect();
    assert_eq!(
        severity,
        vec![Some("Healthy"), Some("High"), Some("High"), Some("High"), Some("Critical")]
    );
    Ok(())
}

#[test]
fn export_summary_counts() -> Result<()> {
    let tableau = prepare_tableau_data(&detect_ad_fatigue(&predictions(), DEFAULT_THRESHOLD)?)?;
    let summary = summarize_export(&tableau)?;

    assert_eq!(summary.records, 5);
    assert_eq!(summary.campaigns, 5);
    assert_eq!(
        summary.date_range,
        Some((
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
        ))
    );
    assert_eq!(
        summary.status_counts,
        vec![("HEALTHY".to_string(), 3), ("FATIGUED".to_string(), 2)]
    );
    assert_eq!(summary.severity_counts.get(&FatigueSeverity::High), Some(&3));
    assert_eq!(summary.severity_counts.get(&FatigueSeverity::Medium), None);
    Ok(())
}

#[test]
fn timestamped_names_use_local_time() {
    let now = Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
    assert_eq!(
        timestamped_file_name("tableau_fatigue_data", "csv", now),
        "tableau_fatigue_data_20240506_070809.csv"
    );
}

#[test]
fn summary_report_lists_most_fatigued() -> Result<()> {
    let analysis = detect_ad_fatigue(&predictions(), DEFAULT_THRESHOLD)?;
    let report = build_summary(&analysis)?;

    assert_eq!(report.total, 5);
    assert_eq!(report.most_fatigued.len(), 5);
    assert_eq!(report.most_fatigued[0].campaign_name, "Alpha");
    assert_eq!(report.most_fatigued[0].status, "FATIGUED");

    let text = report.render();
    assert!(text.contains("Total Campaigns Analyzed: 5"));
    assert!(text.contains("Date Range: 2024-03-01 to 2024-03-05"));
    assert!(text.contains("HEALTHY: 3 campaigns (60.0%)"));
    assert!(text.contains("Fatigue Score: -120.00"));

    let dir = tempfile::tempdir()?;
    let now = Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
    let path = write_summary_report(&analysis, dir.path(), now)?;
    assert!(path.ends_with("fatigue_summary_20240506_070809.txt"));
    assert_eq!(std::fs::read_to_string(path)?, text);
    Ok(())
}
