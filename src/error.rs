// Pipeline error taxonomy. All three are recovered at the tick level; none stops the sampler.

use thiserror::Error;

/// A source reader could not produce a snapshot this tick.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("{source_name} unavailable: {reason}")]
    Unavailable {
        source_name: &'static str,
        reason: String,
    },

    #[error("{source_name} did not answer within {timeout_ms} ms")]
    Timeout {
        source_name: &'static str,
        timeout_ms: u64,
    },

    #[error("{source_name} returned malformed data: {reason}")]
    Malformed {
        source_name: &'static str,
        reason: String,
    },

    #[error("{source_name} blocking task failed: {reason}")]
    Join {
        source_name: &'static str,
        reason: String,
    },
}

impl CollectionError {
    pub fn source_name(&self) -> &'static str {
        match self {
            CollectionError::Unavailable { source_name, .. }
            | CollectionError::Timeout { source_name, .. }
            | CollectionError::Malformed { source_name, .. }
            | CollectionError::Join { source_name, .. } => source_name,
        }
    }
}

/// Persistence gateway failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("store did not answer within {0} ms")]
    Timeout(u64),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    /// Pool and I/O failures mean the store could not be reached; the rest are query errors.
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            e => StoreError::Database(e),
        }
    }
}

/// Broadcast channel failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no live subscribers")]
    NoSubscribers,

    #[error("publish did not complete within {0} ms")]
    Timeout(u64),

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}
