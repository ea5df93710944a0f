use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("raw performance table is missing required column '{column}'")]
    MissingColumn { column: &'static str },

    #[error("CSV error: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },

    #[error("data row {line_index} invalid: {message}")]
    DataRow { line_index: usize, message: String },

    #[error("failed to build raw performance frame: {0}")]
    Frame(#[from] polars::error::PolarsError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<csv::Error> for ParserError {
    fn from(source: csv::Error) -> Self {
        ParserError::Csv { source }
    }
}
