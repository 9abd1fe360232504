//! Error types for the consumer pool

use thiserror::Error;

/// Error type produced by the injected creation and destruction functions
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Consumer creation failed: {0}")]
    Create(#[source] BoxError),

    #[error("Consumer destruction failed: {0}")]
    Destroy(#[source] BoxError),

    #[error("Shutdown failed to destroy {failed} of {attempted} consumers")]
    Shutdown {
        failed: usize,
        attempted: usize,
        errors: Vec<BoxError>,
    },

    #[error("Pool has been shut down")]
    Closed,

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Metrics export failed: {0}")]
    Metrics(String),
}

pub type PoolResult<T> = Result<T, PoolError>;

/// Misuse of [`RoundRobinPool::release`](crate::RoundRobinPool::release).
///
/// These indicate a bug in the caller (double release, releasing a handle
/// from another pool) and are kept apart from [`PoolError`] so they cannot be
/// handled by the same recovery path by accident.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseError {
    #[error("Consumer is not owned by this pool")]
    UnknownConsumer,

    #[error("Consumer {0} is not currently granted")]
    NotGranted(u64),

    #[error("Pool has been shut down")]
    Closed,
}
