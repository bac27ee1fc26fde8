//! Error types for the DummySite controller

use thiserror::Error;

/// Result type for the controller
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the controller
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Object already exists (HTTP 409 on create)
    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    /// Website content could not be fetched
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Object is missing required fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Watch stream reported an error
    #[error("Watch error: {0}")]
    Watch(String),

    /// Watch resource version is too old (HTTP 410)
    #[error("Watch expired: {0}")]
    WatchExpired(String),
}

impl Error {
    /// Map a create failure, turning a 409 Conflict into [`Error::AlreadyExists`]
    pub fn from_create(err: kube::Error, what: &str) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 409 => Error::AlreadyExists(what.to_string()),
            other => Error::Kube(other),
        }
    }

    /// Whether this error is a create conflict
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists(_))
    }
}
