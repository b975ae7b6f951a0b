use std::result::Result as StdResult;

use thiserror::Error;

/// Errors raised by the core domain helpers.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = StdResult<T, CoreError>;
