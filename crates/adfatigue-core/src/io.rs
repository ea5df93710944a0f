use std::cmp::Ordering;
use std::fs::{self, File};
use std::path::Path;

use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Columns that stay text in every stage table, whatever their values look like.
pub const TEXT_COLUMNS: [&str; 3] = ["date", "campaign_id", "campaign_name"];

/// Reads a stage table written by an upstream stage.
///
/// The whole file is scanned for type inference, and identifier columns come
/// back as strings even when every value happens to be numeric.
pub fn read_table(path: &Path, stage: &'static str) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PipelineError::MissingInput {
            stage,
            path: path.to_path_buf(),
        });
    }

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    for name in TEXT_COLUMNS {
        let Ok(column) = df.column(name) else {
            continue;
        };
        if column.dtype() != &DataType::String {
            let text = column.cast(&DataType::String)?;
            df.with_column(text)?;
        }
    }
    Ok(df)
}

pub fn write_table(path: &Path, df: &mut DataFrame) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

pub fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    let missing: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|name| df.column(name).is_err())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::SchemaMismatch(format!(
            "missing columns: {}",
            missing.join(", ")
        )))
    }
}

/// Numeric column as nullable floats, whatever integer/float type the CSV
/// reader inferred.
pub fn optional_f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

/// Numeric column that must be fully populated.
pub fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    optional_f64_column(df, name)?
        .into_iter()
        .enumerate()
        .map(|(idx, value)| {
            value.ok_or_else(|| {
                PipelineError::Computation(format!("column {name} has a missing value at row {idx}"))
            })
        })
        .collect()
}

/// Text column; identifiers read back from CSV may have been inferred as integers.
pub fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

pub fn bool_column(df: &DataFrame, name: &str) -> Result<Vec<Option<bool>>> {
    string_column(df, name)?
        .into_iter()
        .map(|value| match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("") => Ok(None),
            Some("true") => Ok(Some(true)),
            Some("false") => Ok(Some(false)),
            Some(other) => Err(PipelineError::Computation(format!(
                "column {name} has non-boolean value '{other}'"
            ))),
        })
        .collect()
}

/// Row order that sorts `values` (NaN always last, ties keep input order).
pub fn sort_order(values: &[f64], descending: bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        let (x, y) = (values[a], values[b]);
        match (x.is_nan(), y.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) if descending => y.total_cmp(&x),
            (false, false) => x.total_cmp(&y),
        }
    });
    order
}

pub fn take_rows(df: &DataFrame, order: &[usize]) -> Result<DataFrame> {
    let indices: Vec<IdxSize> = order.iter().map(|&idx| idx as IdxSize).collect();
    Ok(df.take(&IdxCa::from_vec("idx".into(), indices))?)
}
