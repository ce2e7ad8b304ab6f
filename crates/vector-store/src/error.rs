use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Vector store is full: capacity of {max} vectors reached")]
    CapacityExceeded { max: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Vectorizer is not fitted; call fit() first")]
    NotFitted,

    #[error("Cannot fit vectorizer on an empty corpus")]
    EmptyCorpus,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
