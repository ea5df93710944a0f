pub mod classifier;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod export;
pub mod forest;
pub mod ingestion;
pub mod io;
pub mod model;
pub mod pipelines;
pub mod predictor;
pub mod report;
pub mod scaler;
pub mod split;
pub mod trainer;

pub use error::{PipelineError, Result};
