use adfatigue_core::io::{read_table, string_column, write_table};
use adfatigue_core::PipelineError;
use anyhow::Result;
use polars::prelude::*;

#[test]
fn late_text_ids_survive_a_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("processed/table.csv");

    let mut ids: Vec<String> = (0..150).map(|i| (1000 + i).to_string()).collect();
    ids.push("brand-search".to_string());
    let scores: Vec<f64> = (0..ids.len()).map(|i| i as f64).collect();
    let mut df = df!(
        "campaign_id" => ids,
        "predicted_fatigue_score" => scores,
    )?;
    write_table(&path, &mut df)?;

    let table = read_table(&path, "detect")?;
    assert_eq!(table.column("campaign_id")?.dtype(), &DataType::String);
    let read_ids = string_column(&table, "campaign_id")?;
    assert_eq!(read_ids[0].as_deref(), Some("1000"));
    assert_eq!(read_ids[150].as_deref(), Some("brand-search"));
    Ok(())
}

#[test]
fn numeric_only_ids_are_read_as_text() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("table.csv");
    let mut df = df!(
        "date" => &["2024-01-01", "2024-01-02"],
        "campaign_id" => &["7", "8"],
        "campaign_name" => &["12", "13"],
    )?;
    write_table(&path, &mut df)?;

    let table = read_table(&path, "predict")?;
    for name in ["date", "campaign_id", "campaign_name"] {
        assert_eq!(table.column(name)?.dtype(), &DataType::String, "{name}");
    }
    Ok(())
}

#[test]
fn missing_table_names_the_stage() {
    let err = read_table(std::path::Path::new("/nonexistent/train.csv"), "train").unwrap_err();
    assert!(matches!(err, PipelineError::MissingInput { stage: "train", .. }));
}
