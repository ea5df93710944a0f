pub mod errors;
pub mod model;
mod reader;

pub use errors::ParserError;
pub use model::{
    build_raw_dataframe, parse_date, RawCampaignRecord, DATE_FORMAT, NUMERIC_COLUMNS, RAW_COLUMNS,
};
pub use reader::{
    parse_raw_performance, parse_raw_performance_frame, read_raw_performance,
    write_raw_performance,
};

#[cfg(test)]
mod tests;
