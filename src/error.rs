//! Error types for infoplane

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("No activations recorded for layer '{0}'")]
    EmptyActivations(String),

    #[error("Layer not found in model: {0}")]
    LayerNotFound(String),

    #[error("Layer '{0}' is already registered with a different module")]
    DuplicateLayer(String),

    #[error("Estimation session is active: {0}")]
    SessionActive(String),

    #[error("Estimation session is not prepared: call prepare() first")]
    NotPrepared,

    #[error("Estimation session is already prepared")]
    AlreadyPrepared,

    #[error("Estimator input mismatch: {0}")]
    EstimatorMismatch(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(e: ndarray::ShapeError) -> Self {
        Error::InvalidParameter(format!("array shape: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
