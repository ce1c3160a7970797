//! Error types for the voice gate

use thiserror::Error;

/// Result type alias for voice gate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice gate
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Telemetry reporting error
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Event channel closed or full
    #[error("event channel error: {0}")]
    Channel(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid URL
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}
