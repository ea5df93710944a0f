use polars::prelude::*;
use tracing::info;

use crate::cleaner::IDENTIFIER_COLUMNS;
use crate::error::Result;
use crate::io::{require_columns, sort_order, take_rows};
use crate::model::FatigueModel;
use crate::trainer::feature_matrix;

pub const PREDICTION_COLUMN: &str = "predicted_fatigue_score";

/// Scores every held-out row with the persisted model and returns
/// (campaign_id, campaign_name, date, predicted_fatigue_score) sorted by
/// ascending score.
pub fn predict_fatigue(model: &FatigueModel, test: &DataFrame) -> Result<DataFrame> {
    require_columns(test, &IDENTIFIER_COLUMNS)?;
    let feature_names: Vec<&str> = model.feature_names.iter().map(String::as_str).collect();
    let rows = feature_matrix(test, &feature_names)?;
    let predictions = model.predict(&rows)?;

    let mut columns: Vec<Column> = Vec::with_capacity(4);
    for name in IDENTIFIER_COLUMNS {
        columns.push(test.column(name)?.cast(&DataType::String)?);
    }
    columns.push(Series::new(PREDICTION_COLUMN.into(), predictions.clone()).into());
    let results = DataFrame::new(columns)?;

    let sorted = take_rows(&results, &sort_order(&predictions, false))?;
    info!(rows = sorted.height(), "generated fatigue predictions");
    Ok(sorted)
}
