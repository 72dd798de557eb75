use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the executor, the coordinator and service initialization.
///
/// `Error` is `Clone` because a single batch failure is broadcast verbatim to
/// every contributor of the epoch that produced it.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The submitted work returned an error.
    #[error("job failed: {0}")]
    Job(Arc<anyhow::Error>),

    /// The submitted work panicked. The executor keeps running.
    #[error("job panicked: {0}")]
    Panicked(String),

    /// A result slot was dropped before it was resolved.
    #[error("result slot abandoned before completion")]
    Abandoned,

    /// The batch handler returned a different number of outcomes than it was given items.
    #[error("batch returned {actual} outcomes for {expected} items")]
    OutcomeMismatch { expected: usize, actual: usize },

    /// The backing service has not finished initializing.
    #[error("service not initialized")]
    NotReady,

    /// One-time initialization failed.
    #[error("initialization failed: {0}")]
    Init(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Job(Arc::new(e))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
