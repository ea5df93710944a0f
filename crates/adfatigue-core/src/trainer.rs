use chrono::Utc;
use polars::prelude::DataFrame;
use tracing::info;

use crate::cleaner::{FEATURE_COLUMNS, TARGET_COLUMN};
use crate::config::TrainingConfig;
use crate::error::Result;
use crate::forest::{ForestParams, RandomForest};
use crate::io::{f64_column, require_columns};
use crate::model::{FatigueModel, ValidationMetrics, MODEL_FORMAT_VERSION};
use crate::scaler::StandardScaler;
use crate::split::shuffled_split_indices;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingOptions {
    pub forest: ForestParams,
    pub validation_fraction: f64,
    pub split_seed: u64,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self::from(&TrainingConfig::default())
    }
}

impl From<&TrainingConfig> for TrainingOptions {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            forest: ForestParams {
                n_trees: config.n_trees,
                max_depth: config.max_depth,
                min_samples_split: config.min_samples_split,
                seed: config.seed,
            },
            validation_fraction: config.validation_fraction,
            split_seed: config.seed,
        }
    }
}

/// Row-major feature matrix in `columns` order.
pub fn feature_matrix(df: &DataFrame, columns: &[&str]) -> Result<Vec<Vec<f64>>> {
    require_columns(df, columns)?;
    let by_column = columns
        .iter()
        .map(|name| f64_column(df, name))
        .collect::<Result<Vec<_>>>()?;

    Ok((0..df.height())
        .map(|row| by_column.iter().map(|values| values[row]).collect())
        .collect())
}

fn select_rows<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

/// Fits scaler and forest on the training table.
///
/// A seeded hold-out split of the table is used for validation metrics; the
/// scaler only ever sees the fit partition.
pub fn train_model(train: &DataFrame, options: &TrainingOptions) -> Result<FatigueModel> {
    require_columns(train, &[TARGET_COLUMN])?;
    let x = feature_matrix(train, &FEATURE_COLUMNS)?;
    let y = f64_column(train, TARGET_COLUMN)?;

    let split = shuffled_split_indices(x.len(), options.validation_fraction, options.split_seed)?;
    let x_fit = select_rows(&x, &split.train);
    let y_fit = select_rows(&y, &split.train);
    let x_val = select_rows(&x, &split.test);
    let y_val = select_rows(&y, &split.test);

    let scaler = StandardScaler::fit(&x_fit)?;
    let forest = RandomForest::fit(&scaler.transform(&x_fit)?, &y_fit, options.forest)?;

    let predicted = forest.predict(&scaler.transform(&x_val)?)?;
    let validation = ValidationMetrics::compute(&y_val, &predicted);

    info!(
        fit_rows = x_fit.len(),
        validation_rows = validation.rows,
        n_trees = options.forest.n_trees,
        max_depth = options.forest.max_depth,
        nodes = forest.trees().iter().map(|tree| tree.n_nodes()).sum::<usize>(),
        rmse = validation.rmse,
        mae = validation.mae,
        r2 = validation.r2,
        "trained fatigue model"
    );

    Ok(FatigueModel {
        format_version: MODEL_FORMAT_VERSION,
        feature_names: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        scaler,
        forest,
        trained_at: Utc::now(),
        training_rows: x_fit.len(),
        validation,
    })
}
