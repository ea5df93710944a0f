use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::errors::ParserError;
use crate::model::RAW_COLUMNS;
use crate::{parse_raw_performance, parse_raw_performance_frame, write_raw_performance};

fn fixture(path: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let full_path = base.join("tests/data").join(path);
    fs::read_to_string(&full_path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", full_path.display(), err))
}

#[test]
fn parses_raw_performance_fixture() {
    let records = parse_raw_performance(&fixture("campaign_performance.csv")).expect("parse failed");

    assert_eq!(records.len(), 4);
    assert_eq!(records[0].campaign_id, "1001");
    assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    assert_eq!(records[0].campaign_name.as_deref(), Some("Spring Sale"));

    let sparse = &records[2];
    assert_eq!(sparse.campaign_id, "2002");
    assert!(sparse.campaign_name.is_none());
    assert!(sparse.clicks.is_none());
    assert!(sparse.ctr.is_none());
    assert_eq!(sparse.impressions, Some(800.0));
}

#[test]
fn frame_keeps_raw_column_order() {
    let df = parse_raw_performance_frame(&fixture("campaign_performance.csv")).expect("frame");

    let names: Vec<&str> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.as_str())
        .collect();
    assert_eq!(names, RAW_COLUMNS.to_vec());
    assert_eq!(df.height(), 4);

    let clicks = df.column("clicks").unwrap().f64().unwrap();
    assert_eq!(clicks.get(2), None);
    let dates = df.column("date").unwrap().str().unwrap();
    assert_eq!(dates.get(1), Some("2024-03-01"));
}

#[test]
fn reordered_headers_and_timestamps_are_accepted() {
    let content = "campaign_id,date,campaign_name,impressions,clicks,cost,conversions,conversion_value,ctr,conversion_rate,cpc,cpa,roas,extra\n\
                   7,2024-05-06 00:00:00,Promo,10,1,1,0,0,10,0,1,0,0,ignored\n";
    let records = parse_raw_performance(content).expect("parse");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
    assert_eq!(records[0].ctr, Some(10.0));
}

#[test]
fn missing_column_is_reported() {
    let content = "date,campaign_id,campaign_name,impressions\n2024-01-01,1,A,10\n";
    let err = parse_raw_performance(content).unwrap_err();

    assert!(matches!(err, ParserError::MissingColumn { column: "clicks" }));
}

#[test]
fn non_numeric_metric_names_the_line() {
    let header = RAW_COLUMNS.join(",");
    let content = format!("{header}\n2024-01-01,1,A,10,many,1,0,0,10,0,1,0,0\n");
    let err = parse_raw_performance(&content).unwrap_err();

    match err {
        ParserError::DataRow { line_index, message } => {
            assert_eq!(line_index, 2);
            assert!(message.contains("clicks"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn header_only_file_yields_empty_frame() {
    let content = format!("{}\n", RAW_COLUMNS.join(","));
    let df = parse_raw_performance_frame(&content).expect("frame");

    assert_eq!(df.height(), 0);
    assert_eq!(df.width(), RAW_COLUMNS.len());
}

#[test]
fn written_table_reads_back() {
    let records = parse_raw_performance(&fixture("campaign_performance.csv")).expect("parse");
    let dir = std::env::temp_dir().join(format!("adfatigue-parser-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("raw.csv");

    write_raw_performance(&path, &records).expect("write");
    let reread = parse_raw_performance(&fs::read_to_string(&path).unwrap()).expect("reparse");

    assert_eq!(reread, records);
    fs::remove_dir_all(&dir).ok();
}
