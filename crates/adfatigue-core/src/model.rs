use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::forest::RandomForest;
use crate::scaler::StandardScaler;

pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Hold-out metrics recorded at training time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub rows: usize,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl ValidationMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        let rows = actual.len().min(predicted.len());
        if rows == 0 {
            return Self {
                rows: 0,
                rmse: 0.0,
                mae: 0.0,
                r2: 0.0,
            };
        }
        let n = rows as f64;
        let pairs = actual.iter().zip(predicted).take(rows);

        let (mut ss_res, mut abs_err) = (0.0, 0.0);
        for (a, p) in pairs.clone() {
            ss_res += (a - p).powi(2);
            abs_err += (a - p).abs();
        }
        let mean = actual.iter().take(rows).sum::<f64>() / n;
        let ss_tot: f64 = actual.iter().take(rows).map(|a| (a - mean).powi(2)).sum();

        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Self {
            rows,
            rmse: (ss_res / n).sqrt(),
            mae: abs_err / n,
            r2,
        }
    }
}

/// Persisted fatigue model: the forest together with the scaler it was
/// trained behind and the ordered feature names both expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueModel {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub forest: RandomForest,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
    pub validation: ValidationMetrics,
}

impl FatigueModel {
    /// Scales raw feature rows with the stored scaler, then predicts.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let scaled = self.scaler.transform(rows)?;
        self.forest.predict(&scaled)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingInput {
                stage: "predict",
                path: path.to_path_buf(),
            });
        }
        let reader = BufReader::new(File::open(path)?);
        let model: Self = serde_json::from_reader(reader)?;
        if model.format_version != MODEL_FORMAT_VERSION {
            return Err(PipelineError::SchemaMismatch(format!(
                "model format version {} is not supported (expected {})",
                model.format_version, MODEL_FORMAT_VERSION
            )));
        }
        if model.feature_names.len() != model.scaler.n_features()
            || model.feature_names.len() != model.forest.n_features
        {
            return Err(PipelineError::SchemaMismatch(
                "model feature names, scaler and forest disagree on width".to_string(),
            ));
        }
        Ok(model)
    }
}
