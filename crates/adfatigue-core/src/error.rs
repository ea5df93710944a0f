// crates/adfatigue-core/src/error.rs

use std::path::PathBuf;

use thiserror::Error;

/// One failure entry reported by the ads platform for a rejected request.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceFailure {
    pub message: String,
    pub field_paths: Vec<String>,
}

/// A failed ads-platform request: request id, status name and the
/// per-error messages with the fields they point at.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("request \"{request_id}\" failed with status \"{status}\"{}", format_failures(.failures))]
pub struct ExternalServiceError {
    pub request_id: String,
    pub status: String,
    pub failures: Vec<ServiceFailure>,
}

/// `; <message> (on field: a, b)` per failure, in reported order.
fn format_failures(failures: &[ServiceFailure]) -> String {
    failures
        .iter()
        .map(|failure| {
            if failure.field_paths.is_empty() {
                format!("; {}", failure.message)
            } else {
                format!(
                    "; {} (on field: {})",
                    failure.message,
                    failure.field_paths.join(", ")
                )
            }
        })
        .collect()
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{stage}: input file {} not found; run the upstream stage first", path.display())]
    MissingInput { stage: &'static str, path: PathBuf },

    #[error("ads platform error: {0}")]
    ExternalService(#[from] ExternalServiceError),

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Raw table parsing failed: {0}")]
    Parser(#[from] adfatigue_parser::ParserError),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
