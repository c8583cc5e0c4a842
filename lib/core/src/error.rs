use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid bound for '{name}': {value} (must be positive)")]
    InvalidBound { name: &'static str, value: f64 },

    #[error("Invalid property: {0}")]
    InvalidProperty(String),

    #[error("Engine not ready: {0}")]
    NotReady(String),

    #[error("Training dataset not found: {0}")]
    TrainingDataMissing(String),

    #[error("No usable training samples in dataset")]
    NoTrainingData,

    #[error("Invalid feature dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corrupt artifact: {0}")]
    CorruptArtifact(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
