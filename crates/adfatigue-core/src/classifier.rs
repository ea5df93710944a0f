use std::fmt;

use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::io::{f64_column, sort_order, take_rows};
use crate::predictor::PREDICTION_COLUMN;

pub const DEFAULT_THRESHOLD: f64 = -70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FatigueStatus {
    Fatigued,
    Healthy,
}

impl FatigueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FatigueStatus::Fatigued => "FATIGUED",
            FatigueStatus::Healthy => "HEALTHY",
        }
    }

    pub fn from_flag(flag: bool) -> Self {
        if flag {
            FatigueStatus::Fatigued
        } else {
            FatigueStatus::Healthy
        }
    }
}

impl fmt::Display for FatigueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strictly below the threshold; a score equal to it is healthy.
pub fn is_fatigued(score: f64, threshold: f64) -> bool {
    score < threshold
}

/// Adds `fatigue_flag` and `fatigue_status` to the predictions and sorts by
/// descending predicted score.
pub fn detect_ad_fatigue(predictions: &DataFrame, threshold: f64) -> Result<DataFrame> {
    let scores = f64_column(predictions, PREDICTION_COLUMN)?;
    let flags: Vec<bool> = scores.iter().map(|s| is_fatigued(*s, threshold)).collect();
    let statuses: Vec<&str> = flags
        .iter()
        .map(|flag| FatigueStatus::from_flag(*flag).as_str())
        .collect();

    let mut output = predictions.clone();
    output.hstack_mut(&mut [
        Series::new("fatigue_flag".into(), flags.clone()).into(),
        Series::new("fatigue_status".into(), statuses).into(),
    ])?;

    let fatigued = flags.iter().filter(|flag| **flag).count();
    info!(
        rows = output.height(),
        fatigued,
        threshold,
        "classified campaign fatigue"
    );

    take_rows(&output, &sort_order(&scores, true))
}
