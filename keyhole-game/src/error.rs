//! Library error types
use thiserror::Error;

/// Raised when a document cannot be instantiated as a live experience.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("experience document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{kind} is missing an id")]
    MissingId { kind: &'static str },
    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },
    #[error("starting room '{0}' does not exist")]
    UnknownStartingRoom(String),
    #[error("experience document could not be fingerprinted: {0}")]
    Fingerprint(#[source] serde_json::Error),
}

/// Raised when a snapshot cannot be captured or replayed.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot belongs to experience '{found}', expected '{expected}'")]
    ExperienceMismatch { expected: String, found: String },
    #[error("snapshot was taken from a different revision of '{0}'")]
    FingerprintMismatch(String),
    #[error("snapshot references unknown {kind} '{id}'")]
    UnknownEntity { kind: &'static str, id: String },
    #[error("snapshot could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}
