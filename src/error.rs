//! Error types for Windows container config generation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported option: {0}")]
    UnsupportedOption(String),

    #[error("Invalid quantity {input:?}: {reason}")]
    InvalidQuantity { input: String, reason: String },

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if the pod spec asked for something Windows containers cannot do
    pub fn is_unsupported_option(&self) -> bool {
        matches!(self, Error::UnsupportedOption(_))
    }

    pub(crate) fn invalid_quantity(input: &str, reason: impl Into<String>) -> Self {
        Error::InvalidQuantity {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
