use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolveError>;

pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Failure reported by a [`crate::RepositorySource`].
///
/// Only [`SourceError::NotFound`] is recoverable by the explorer and the
/// tracer; every other variant aborts the current resolution unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited by remote source: {0}")]
    RateLimited(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound(_))
    }

    pub const fn code(&self) -> &'static str {
        match self {
            SourceError::NotFound(_) => "not_found",
            SourceError::RateLimited(_) => "rate_limited",
            SourceError::Unauthorized(_) => "unauthorized",
            SourceError::Network(_) => "network",
            SourceError::Decode(_) => "decode",
        }
    }
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Invalid repository reference: {0}")]
    InvalidReference(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Remote source error: {0}")]
    Source(#[from] SourceError),

    #[error("Resolution cancelled")]
    Cancelled,

    #[error("Profile error: {0}")]
    Profile(String),
}
