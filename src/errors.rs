//! Errors for the fleet map
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetMapError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Feed returned HTTP status {status}")]
    FeedStatus { status: reqwest::StatusCode },

    #[error("Feed returned no vehicles")]
    EmptyFeed,

    #[error("Invalid feed envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Could not write {path}: {origin}")]
    Persist { path: PathBuf, origin: String },
}
