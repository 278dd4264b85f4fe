use covidrank::error::CovidRankError;
use polars::error::PolarsError;

#[derive(thiserror::Error, Debug)]
pub enum CovidRankCliError {
    #[error("Anyhow error: {0:#}")]
    Anyhow(#[from] anyhow::Error),
    #[error("covidrank error: {0}")]
    CovidRankError(#[from] CovidRankError),
    #[error("serde JSON error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("TOML error in config file: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("std IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type CovidRankCliResult<T> = Result<T, CovidRankCliError>;
