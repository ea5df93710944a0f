use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use adfatigue_parser::read_raw_performance;
use chrono::{DateTime, Local, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::classifier::detect_ad_fatigue;
use crate::cleaner::{clean_campaign_data, CleaningOptions};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::export::{prepare_tableau_data, summarize_export, timestamped_file_name};
use crate::io::{read_table, write_table};
use crate::model::FatigueModel;
use crate::predictor::predict_fatigue;
use crate::report::write_summary_report;
use crate::split::partition_cleaned;
use crate::trainer::{train_model, TrainingOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageKind {
    Clean,
    Train,
    Predict,
    Detect,
    Export,
    Report,
}

#[derive(Debug, Clone)]
pub struct StageInfo {
    pub kind: StageKind,
    pub name: &'static str,
    pub description: &'static str,
    /// Outputs are deterministic files that a later run can reuse.
    pub reusable: bool,
}

static STAGES: Lazy<Vec<StageInfo>> = Lazy::new(|| {
    vec![
        StageInfo {
            kind: StageKind::Clean,
            name: "clean",
            description: "Deduplicate, impute and derive fatigue features; split train/test",
            reusable: true,
        },
        StageInfo {
            kind: StageKind::Train,
            name: "train",
            description: "Fit scaler and bagged regression trees on the train table",
            reusable: true,
        },
        StageInfo {
            kind: StageKind::Predict,
            name: "predict",
            description: "Score the test table with the persisted model",
            reusable: true,
        },
        StageInfo {
            kind: StageKind::Detect,
            name: "detect",
            description: "Flag predictions below the fatigue threshold",
            reusable: true,
        },
        StageInfo {
            kind: StageKind::Export,
            name: "export",
            description: "Write the timestamped Tableau export",
            reusable: false,
        },
        StageInfo {
            kind: StageKind::Report,
            name: "report",
            description: "Write the timestamped summary report",
            reusable: false,
        },
    ]
});

pub fn all_stages() -> &'static [StageInfo] {
    STAGES.as_slice()
}

/// A stage bound to concrete input and output locations.
#[derive(Debug, Clone)]
pub struct StageDescriptor {
    pub info: &'static StageInfo,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
}

impl StageDescriptor {
    pub fn name(&self) -> &'static str {
        self.info.name
    }
}

/// Ordered stage list for a configuration.
pub fn stage_plan(config: &PipelineConfig) -> Vec<StageDescriptor> {
    let paths = &config.paths;
    all_stages()
        .iter()
        .map(|info| {
            let (inputs, outputs) = match info.kind {
                StageKind::Clean => (
                    vec![paths.raw_data.clone()],
                    vec![paths.train_table.clone(), paths.test_table.clone()],
                ),
                StageKind::Train => (vec![paths.train_table.clone()], vec![paths.model.clone()]),
                StageKind::Predict => (
                    vec![paths.model.clone(), paths.test_table.clone()],
                    vec![paths.predictions.clone()],
                ),
                StageKind::Detect => (
                    vec![paths.predictions.clone()],
                    vec![paths.fatigue_analysis.clone()],
                ),
                StageKind::Export => (
                    vec![paths.fatigue_analysis.clone()],
                    vec![paths.export_dir.clone()],
                ),
                StageKind::Report => (
                    vec![paths.fatigue_analysis.clone()],
                    vec![paths.reports_dir.clone()],
                ),
            };
            StageDescriptor {
                info,
                inputs,
                outputs,
            }
        })
        .collect()
}

/// Record of a completed stage, used to skip it when nothing changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageManifest {
    pub stage: String,
    pub run_id: Uuid,
    pub completed_at: DateTime<Utc>,
    /// Input path → blake3 hex digest.
    pub inputs: BTreeMap<String, String>,
    /// blake3 of the configuration section the stage reads.
    #[serde(default)]
    pub settings: String,
}

fn manifest_path(config: &PipelineConfig, stage: &str) -> PathBuf {
    config.paths.manifest_dir.join(format!("{stage}.json"))
}

pub fn hash_file(path: &Path) -> Result<String> {
    let contents = fs::read(path)?;
    Ok(blake3::hash(&contents).to_hex().to_string())
}

fn hash_inputs(descriptor: &StageDescriptor) -> Result<BTreeMap<String, String>> {
    descriptor
        .inputs
        .iter()
        .map(|path| Ok((path.display().to_string(), hash_file(path)?)))
        .collect()
}

/// Digest of the configuration that shapes a stage's output. Stages driven
/// only by their input files hash `null`.
pub fn settings_hash(config: &PipelineConfig, kind: StageKind) -> Result<String> {
    let settings = match kind {
        StageKind::Clean => serde_json::to_value(&config.cleaning)?,
        StageKind::Train => serde_json::to_value(&config.training)?,
        StageKind::Detect => serde_json::to_value(&config.detection)?,
        StageKind::Predict | StageKind::Export | StageKind::Report => serde_json::Value::Null,
    };
    let encoded = serde_json::to_vec(&settings)?;
    Ok(blake3::hash(&encoded).to_hex().to_string())
}

pub fn read_manifest(config: &PipelineConfig, stage: &str) -> Option<StageManifest> {
    let contents = fs::read(manifest_path(config, stage)).ok()?;
    serde_json::from_slice(&contents).ok()
}

fn write_manifest(
    config: &PipelineConfig,
    descriptor: &StageDescriptor,
    run_id: Uuid,
) -> Result<()> {
    let manifest = StageManifest {
        stage: descriptor.name().to_string(),
        run_id,
        completed_at: Utc::now(),
        inputs: hash_inputs(descriptor)?,
        settings: settings_hash(config, descriptor.info.kind)?,
    };
    let path = manifest_path(config, descriptor.name());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec_pretty(&manifest)?)?;
    Ok(())
}

/// True when the stage's outputs exist and both its inputs and its
/// configuration hash to what the last successful run recorded.
pub fn is_up_to_date(config: &PipelineConfig, descriptor: &StageDescriptor) -> bool {
    if !descriptor.info.reusable || !descriptor.outputs.iter().all(|p| p.exists()) {
        return false;
    }
    let Some(manifest) = read_manifest(config, descriptor.name()) else {
        return false;
    };
    match (
        hash_inputs(descriptor),
        settings_hash(config, descriptor.info.kind),
    ) {
        (Ok(inputs), Ok(settings)) => inputs == manifest.inputs && settings == manifest.settings,
        _ => false,
    }
}

/// Executes one stage: read its inputs, transform, write its outputs.
/// Returns the number of rows in the stage's primary output.
pub fn execute_stage(kind: StageKind, config: &PipelineConfig) -> Result<usize> {
    let paths = &config.paths;
    match kind {
        StageKind::Clean => {
            if !paths.raw_data.exists() {
                return Err(PipelineError::MissingInput {
                    stage: "clean",
                    path: paths.raw_data.clone(),
                });
            }
            let raw = read_raw_performance(&paths.raw_data)?;
            info!(records = raw.height(), path = %paths.raw_data.display(), "loaded raw performance data");

            let cleaned = clean_campaign_data(&raw, &CleaningOptions::from(&config.cleaning))?;
            let mut tables = partition_cleaned(
                &cleaned,
                config.cleaning.test_fraction,
                config.cleaning.split_seed,
            )?;
            write_table(&paths.train_table, &mut tables.train)?;
            write_table(&paths.test_table, &mut tables.test)?;
            info!(
                total = cleaned.height(),
                train = tables.train.height(),
                test = tables.test.height(),
                "train/test tables written"
            );
            Ok(cleaned.height())
        }
        StageKind::Train => {
            let train = read_table(&paths.train_table, "train")?;
            let model = train_model(&train, &TrainingOptions::from(&config.training))?;
            model.save(&paths.model)?;
            info!(path = %paths.model.display(), "model saved");
            Ok(model.training_rows)
        }
        StageKind::Predict => {
            let model = FatigueModel::load(&paths.model)?;
            let test = read_table(&paths.test_table, "predict")?;
            let mut predictions = predict_fatigue(&model, &test)?;
            write_table(&paths.predictions, &mut predictions)?;
            info!(path = %paths.predictions.display(), "predictions saved");
            Ok(predictions.height())
        }
        StageKind::Detect => {
            let predictions = read_table(&paths.predictions, "detect")?;
            let mut analysis = detect_ad_fatigue(&predictions, config.detection.threshold)?;
            write_table(&paths.fatigue_analysis, &mut analysis)?;
            info!(path = %paths.fatigue_analysis.display(), "fatigue analysis saved");
            Ok(analysis.height())
        }
        StageKind::Export => {
            let analysis = read_table(&paths.fatigue_analysis, "export")?;
            let mut tableau = prepare_tableau_data(&analysis)?;
            let path = paths
                .export_dir
                .join(timestamped_file_name("tableau_fatigue_data", "csv", Local::now()));
            write_table(&path, &mut tableau)?;

            let summary = summarize_export(&tableau)?;
            info!(
                records = summary.records,
                campaigns = summary.campaigns,
                date_range = ?summary.date_range,
                status = ?summary.status_counts,
                severity = ?summary.severity_counts,
                path = %path.display(),
                "tableau export written"
            );
            Ok(summary.records)
        }
        StageKind::Report => {
            let analysis = read_table(&paths.fatigue_analysis, "report")?;
            write_summary_report(&analysis, &paths.reports_dir, Local::now())?;
            Ok(analysis.height())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageStatus {
    Completed { rows: usize },
    Skipped,
    Failed { error: String },
    NotRun,
}

#[derive(Debug, Clone)]
pub struct StageRecord {
    pub stage: &'static str,
    pub status: StageStatus,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub stages: Vec<StageRecord>,
}

impl RunReport {
    pub fn failed_stage(&self) -> Option<&StageRecord> {
        self.stages
            .iter()
            .find(|record| matches!(record.status, StageStatus::Failed { .. }))
    }

    pub fn succeeded(&self) -> bool {
        self.failed_stage().is_none()
    }
}

/// Runs stages in order. A failing stage is reported and halts the run;
/// outputs of earlier stages stay in place.
pub struct PipelineRunner<'a> {
    config: &'a PipelineConfig,
    force: bool,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            force: false,
        }
    }

    /// Ignore manifests and run every selected stage.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn run_all(&self) -> RunReport {
        self.run(&stage_plan(self.config))
    }

    pub fn run_only(&self, kind: StageKind) -> RunReport {
        let plan: Vec<StageDescriptor> = stage_plan(self.config)
            .into_iter()
            .filter(|descriptor| descriptor.info.kind == kind)
            .collect();
        self.run(&plan)
    }

    fn run(&self, plan: &[StageDescriptor]) -> RunReport {
        let run_id = Uuid::new_v4();
        let skip_enabled = self.config.run.skip_completed && !self.force;
        let mut stages = Vec::with_capacity(plan.len());
        let mut halted = false;

        info!(%run_id, stages = plan.len(), "starting ad fatigue run");

        for descriptor in plan {
            let name = descriptor.name();
            if halted {
                stages.push(StageRecord {
                    stage: name,
                    status: StageStatus::NotRun,
                    elapsed: Duration::ZERO,
                });
                continue;
            }

            if skip_enabled && is_up_to_date(self.config, descriptor) {
                info!(stage = name, "outputs up to date, skipping");
                stages.push(StageRecord {
                    stage: name,
                    status: StageStatus::Skipped,
                    elapsed: Duration::ZERO,
                });
                continue;
            }

            info!(stage = name, description = descriptor.info.description, "running stage");
            let started = Instant::now();
            let status = match execute_stage(descriptor.info.kind, self.config) {
                Ok(rows) => {
                    if let Err(err) = write_manifest(self.config, descriptor, run_id) {
                        warn!(stage = name, error = %err, "failed to record stage manifest");
                    }
                    StageStatus::Completed { rows }
                }
                Err(err) => {
                    error!(stage = name, error = %err, "stage failed");
                    halted = true;
                    StageStatus::Failed {
                        error: err.to_string(),
                    }
                }
            };
            stages.push(StageRecord {
                stage: name,
                status,
                elapsed: started.elapsed(),
            });
        }

        RunReport { run_id, stages }
    }
}
