use thiserror::Error;

/// Errors from repository operations (used by trait definitions in
/// fermata-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the wait registry.
#[derive(Debug, Error)]
pub enum WaitRegistryError {
    #[error("signaling backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("query error: {0}")]
    Query(String),
}
