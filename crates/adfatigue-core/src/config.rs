use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};

pub const CONFIG_ENV_VAR: &str = "ADFATIGUE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "adfatigue.toml";

/// Root configuration for a pipeline run. Every field has a default, so an
/// absent or partial TOML file still yields a complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub cleaning: CleaningConfig,
    pub training: TrainingConfig,
    pub detection: DetectionConfig,
    pub run: RunConfig,
}

/// Locations of every file exchanged between stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_data: PathBuf,
    pub train_table: PathBuf,
    pub test_table: PathBuf,
    pub model: PathBuf,
    pub predictions: PathBuf,
    pub fatigue_analysis: PathBuf,
    pub export_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub manifest_dir: PathBuf,
}

impl PathsConfig {
    /// Standard layout rooted at `base`.
    pub fn rooted(base: &Path) -> Self {
        Self {
            raw_data: base.join("raw/campaign_performance.csv"),
            train_table: base.join("processed/train_campaign_performance.csv"),
            test_table: base.join("processed/test_campaign_performance.csv"),
            model: base.join("models/ad_fatigue_model.json"),
            predictions: base.join("models/predicted_fatigue_scores.csv"),
            fatigue_analysis: base.join("fatigue/fatigue_analysis.csv"),
            export_dir: base.join("analytics/data"),
            reports_dir: base.join("analytics/reports"),
            manifest_dir: base.join(".manifests"),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::rooted(Path::new("data"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Trailing window (rows) of the rolling averages.
    pub rolling_window: usize,
    /// Rows back that the fatigue score compares against.
    pub fatigue_lag: usize,
    /// Clip bounds in standard deviations around the column mean.
    pub clip_sigma: f64,
    pub test_fraction: f64,
    pub split_seed: u64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            rolling_window: 7,
            fatigue_lag: 7,
            clip_sigma: 3.0,
            test_fraction: 0.2,
            split_seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Share of the training table held out for validation metrics.
    pub validation_fraction: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 5,
            min_samples_split: 2,
            validation_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Predicted scores strictly below this value are flagged as fatigued.
    pub threshold: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self { threshold: -70.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Skip stages whose outputs exist and whose inputs are unchanged since
    /// the last successful run.
    pub skip_completed: bool,
}

impl PipelineConfig {
    /// Same defaults with every path rooted at `base`.
    pub fn with_data_dir(base: &Path) -> Self {
        Self {
            paths: PathsConfig::rooted(base),
            ..Self::default()
        }
    }

    /// Resolution order: explicit path, `$ADFATIGUE_CONFIG`, `./adfatigue.toml`,
    /// built-in defaults. An explicit path that cannot be read is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                return Self::load_from_file(&p);
            }
            warn!(path = %path, "{CONFIG_ENV_VAR} points to a missing file, falling back");
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::load_from_file(&local);
        }

        info!("no configuration file found, using built-in defaults");
        Ok(Self::default())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|err| {
            PipelineError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        let config = Self::from_toml(&contents)?;
        info!(path = %path.display(), "loaded pipeline configuration");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.cleaning.rolling_window == 0 {
            errors.push("cleaning.rolling_window must be > 0".to_string());
        }
        if self.cleaning.fatigue_lag == 0 {
            errors.push("cleaning.fatigue_lag must be > 0".to_string());
        }
        if !(self.cleaning.clip_sigma.is_finite() && self.cleaning.clip_sigma > 0.0) {
            errors.push("cleaning.clip_sigma must be a positive number".to_string());
        }
        if !fraction_in_range(self.cleaning.test_fraction) {
            errors.push("cleaning.test_fraction must be within (0, 1)".to_string());
        }
        if self.training.n_trees == 0 {
            errors.push("training.n_trees must be > 0".to_string());
        }
        if self.training.max_depth == 0 {
            errors.push("training.max_depth must be > 0".to_string());
        }
        if self.training.min_samples_split < 2 {
            errors.push("training.min_samples_split must be >= 2".to_string());
        }
        if !fraction_in_range(self.training.validation_fraction) {
            errors.push("training.validation_fraction must be within (0, 1)".to_string());
        }
        if !self.detection.threshold.is_finite() {
            errors.push("detection.threshold must be finite".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Config(errors.join("; ")))
        }
    }
}

fn fraction_in_range(value: f64) -> bool {
    value > 0.0 && value < 1.0
}
