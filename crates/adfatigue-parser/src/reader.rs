use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use polars::prelude::DataFrame;

use crate::errors::ParserError;
use crate::model::{build_raw_dataframe, parse_date, RawCampaignRecord, NUMERIC_COLUMNS, RAW_COLUMNS};

struct ColumnIndex {
    positions: [usize; RAW_COLUMNS.len()],
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self, ParserError> {
        let mut positions = [0usize; RAW_COLUMNS.len()];
        for (slot, column) in positions.iter_mut().zip(RAW_COLUMNS) {
            *slot = headers
                .iter()
                .position(|header| header.trim() == column)
                .ok_or(ParserError::MissingColumn { column })?;
        }
        Ok(Self { positions })
    }

    fn get<'r>(&self, record: &'r StringRecord, column: &str) -> &'r str {
        let idx = RAW_COLUMNS
            .iter()
            .position(|name| *name == column)
            .map(|slot| self.positions[slot]);
        idx.and_then(|i| record.get(i)).unwrap_or("")
    }
}

fn parse_metric(raw: &str, column: &str, line_index: usize) -> Result<Option<f64>, ParserError> {
    let value = raw.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") || value.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|err| ParserError::DataRow {
            line_index,
            message: format!("column {column} value '{value}' is not numeric: {err}"),
        })
}

fn parse_record(
    index: &ColumnIndex,
    record: &StringRecord,
    line_index: usize,
) -> Result<RawCampaignRecord, ParserError> {
    let raw_date = index.get(record, "date");
    let date = parse_date(raw_date).ok_or_else(|| ParserError::DataRow {
        line_index,
        message: format!("unparseable date '{raw_date}'"),
    })?;

    let campaign_id = index.get(record, "campaign_id").trim();
    if campaign_id.is_empty() {
        return Err(ParserError::DataRow {
            line_index,
            message: "campaign_id is empty".to_string(),
        });
    }

    let name = index.get(record, "campaign_name").trim();
    let campaign_name = (!name.is_empty()).then(|| name.to_string());

    let mut metrics = [None; NUMERIC_COLUMNS.len()];
    for (slot, column) in metrics.iter_mut().zip(NUMERIC_COLUMNS) {
        *slot = parse_metric(index.get(record, column), column, line_index)?;
    }
    let [impressions, clicks, cost, conversions, conversion_value, ctr, conversion_rate, cpc, cpa, roas] =
        metrics;

    Ok(RawCampaignRecord {
        date,
        campaign_id: campaign_id.to_string(),
        campaign_name,
        impressions,
        clicks,
        cost,
        conversions,
        conversion_value,
        ctr,
        conversion_rate,
        cpc,
        cpa,
        roas,
    })
}

/// Parses raw performance CSV text. Header names are matched exactly; extra
/// columns are ignored and column order does not matter.
pub fn parse_raw_performance(content: &str) -> Result<Vec<RawCampaignRecord>, ParserError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::Headers)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let index = ColumnIndex::from_headers(&headers)?;

    let mut records = Vec::new();
    for (row_idx, row) in reader.records().enumerate() {
        let row = row?;
        // header occupies line 1
        let line_index = row.position().map_or(row_idx + 2, |pos| pos.line() as usize);
        records.push(parse_record(&index, &row, line_index)?);
    }

    Ok(records)
}

pub fn parse_raw_performance_frame(content: &str) -> Result<DataFrame, ParserError> {
    let records = parse_raw_performance(content)?;
    Ok(build_raw_dataframe(&records)?)
}

pub fn read_raw_performance(path: &Path) -> Result<DataFrame, ParserError> {
    let content = fs::read_to_string(path).map_err(|source| ParserError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_raw_performance_frame(&content)
}

pub fn write_raw_performance(path: &Path, records: &[RawCampaignRecord]) -> Result<(), ParserError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(RAW_COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush().map_err(|source| ParserError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}
