// crates/adfatigue/src/main.rs

use std::path::PathBuf;

use adfatigue_core::config::{PipelineConfig, CONFIG_ENV_VAR};
use adfatigue_core::ingestion::{ingest, DateWindow, PlatformExportSource, DEFAULT_WINDOW_DAYS};
use adfatigue_core::pipelines::{PipelineRunner, RunReport, StageKind, StageStatus};
use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Ad fatigue pipeline: clean, train, predict, detect, export and report.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(long, global = true, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every stage in order
    Run(RunArgs),
    /// Clean raw performance data and write the train/test tables
    Clean,
    /// Train the fatigue model on the train table
    Train,
    /// Score the test table with the saved model
    Predict,
    /// Flag fatigued campaigns in the predictions
    Detect(DetectArgs),
    /// Write the Tableau export
    Export,
    /// Write the summary report
    Report,
    /// Convert an ads platform report export into the raw performance table
    Ingest(IngestArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Run every stage even when its outputs are up to date
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug, Default)]
struct DetectArgs {
    /// Override the configured fatigue threshold
    #[arg(long, allow_negative_numbers = true)]
    threshold: Option<f64>,
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Campaign report exported from the ads platform (CSV)
    #[arg(long)]
    export: PathBuf,
    /// Ads account id
    #[arg(long, env = "ADFATIGUE_ACCOUNT_ID")]
    account: String,
    /// Days of history ending at `--end`
    #[arg(long, default_value_t = DEFAULT_WINDOW_DAYS)]
    days: i64,
    /// Last day of the window (YYYY-MM-DD); defaults to today
    #[arg(long)]
    end: Option<NaiveDate>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::load(cli.config.as_deref())
        .context("failed to load pipeline configuration")?;

    let report = match cli.command {
        Command::Run(args) => PipelineRunner::new(&config).force(args.force).run_all(),
        Command::Clean => run_stage(&config, StageKind::Clean),
        Command::Train => run_stage(&config, StageKind::Train),
        Command::Predict => run_stage(&config, StageKind::Predict),
        Command::Detect(args) => {
            if let Some(threshold) = args.threshold {
                config.detection.threshold = threshold;
                config.validate()?;
            }
            run_stage(&config, StageKind::Detect)
        }
        Command::Export => run_stage(&config, StageKind::Export),
        Command::Report => run_stage(&config, StageKind::Report),
        Command::Ingest(args) => return handle_ingest(&config, args),
    };

    print_run_report(&report);

    if let Some(failed) = report.failed_stage() {
        bail!("stage '{}' failed", failed.stage);
    }
    Ok(())
}

/// Single-stage commands always execute.
fn run_stage(config: &PipelineConfig, kind: StageKind) -> RunReport {
    PipelineRunner::new(config).force(true).run_only(kind)
}

fn handle_ingest(config: &PipelineConfig, args: IngestArgs) -> Result<()> {
    let end = args.end.unwrap_or_else(|| Local::now().date_naive());
    let window = DateWindow::trailing(end, args.days);
    let source = PlatformExportSource { path: args.export };

    let summary = ingest(&source, &args.account, window, &config.paths.raw_data)?;
    info!(records = summary.records, "ingestion finished");

    let mut table = Table::new();
    table.set_header(vec!["Records", "Campaigns", "First date", "Last date", "Output"]);
    table.add_row(vec![
        summary.records.to_string(),
        summary.campaigns.to_string(),
        summary.first_date.map(|d| d.to_string()).unwrap_or_default(),
        summary.last_date.map(|d| d.to_string()).unwrap_or_default(),
        config.paths.raw_data.display().to_string(),
    ]);
    println!("{table}");
    Ok(())
}

fn print_run_report(report: &RunReport) {
    let mut table = Table::new();
    table.set_header(vec!["Stage", "Status", "Rows", "Elapsed"]);
    for record in &report.stages {
        let (status, rows) = match &record.status {
            StageStatus::Completed { rows } => ("completed".to_string(), rows.to_string()),
            StageStatus::Skipped => ("skipped".to_string(), String::new()),
            StageStatus::Failed { error } => (format!("failed: {error}"), String::new()),
            StageStatus::NotRun => ("not run".to_string(), String::new()),
        };
        table.add_row(vec![
            record.stage.to_string(),
            status,
            rows,
            format!("{:.2}s", record.elapsed.as_secs_f64()),
        ]);
    }
    println!("run {}", report.run_id);
    println!("{table}");
}
