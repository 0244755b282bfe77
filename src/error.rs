//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O, descriptor, table and raster errors, and provides semantic
//! variants for configuration and orchestration failures.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Granule identifier error: {0}")]
    GranuleId(#[from] crate::io::GranuleIdError),

    #[error("Descriptor error: {0}")]
    Descriptor(#[from] crate::io::DescriptorError),

    #[error("Raster error: {0}")]
    Raster(#[from] crate::io::RasterError),

    #[error("Metadata table error: {0}")]
    Table(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Unsupported reducer `{0}`; expected `min` or `max`")]
    UnsupportedReducer(String),

    #[error("Unsupported resampling kernel `{0}`; expected `nearest`, `bilinear` or `cubic`")]
    UnsupportedResampling(String),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("{dir} lacks bands: {bands}")]
    MissingBands { dir: String, bands: String },

    #[error("Missing required input: {0}")]
    MissingInput(String),
}
