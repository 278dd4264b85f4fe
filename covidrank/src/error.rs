//! Error types.

use std::path::PathBuf;

use crate::metrics::MetricKind;

#[derive(thiserror::Error, Debug)]
pub enum CovidRankError {
    #[error("Wrapped anyhow error: {0}")]
    AnyhowError(#[from] anyhow::Error),
    #[error("Source '{url}' could not be fetched and no local copy exists at '{}'", path.display())]
    SourceUnavailable { url: String, path: PathBuf },
    #[error("Invalid series: {0}")]
    InvalidSeries(String),
    #[error("Column not found: {0}")]
    MissingColumn(String),
    #[error("Selection is empty: {0}")]
    EmptySelection(String),
    #[error("No {what} at index {index} (catalog has {len} entries)")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    #[error("Trend overlay is not available for metric: {0}")]
    TrendUnavailable(MetricKind),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Wrapped polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
    #[error("Wrapped IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Wrapped HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type CovidRankResult<T> = Result<T, CovidRankError>;
