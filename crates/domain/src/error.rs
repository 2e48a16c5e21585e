use thiserror::Error;

/// Missing resources surface as `AccessDenied` so callers cannot probe
/// which thread ids exist.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("access denied")]
    AccessDenied,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}
