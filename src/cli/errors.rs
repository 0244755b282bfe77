use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No bands configured for sensor: {sensor}. Configured: {available}")]
    UnknownSensor { sensor: String, available: String },

    #[error("Configuration file not found: {path}")]
    MissingConfig { path: String },

    #[error(transparent)]
    Pipeline(#[from] hlsmosaic::Error),
}
