//! Error types for ranctl

use thiserror::Error;

/// Error types shared across the ranctl crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Southbound protocol errors.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Network I/O errors.
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// Identifier parsing errors (e.g. un-decodable ECGI hex string).
    #[error("Identifier error: {0}")]
    Identifier(String),

    /// YAML parsing errors.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}
