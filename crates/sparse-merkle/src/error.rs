//! Error types for the sparse Merkle tree.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmtError {
    #[error("Hash function output does not match the {mode} representation: {output}")]
    InvalidHashFunctionOutput { mode: &'static str, output: String },

    #[error("Parameter is not a valid {mode} element: {value}")]
    InvalidParameterType { mode: &'static str, value: String },

    #[error("Key {0} already exists")]
    KeyAlreadyExists(String),

    #[error("Key {0} does not exist")]
    KeyNotFound(String),

    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    #[error("Node {0} is referenced but not stored")]
    MissingNode(String),

    #[error("Traversal exceeded 256 levels")]
    DepthExceeded,

    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SmtResult<T> = std::result::Result<T, SmtError>;
