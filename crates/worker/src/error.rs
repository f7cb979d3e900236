use transit_core::error::CoreError;

/// Errors raised while importing a single entity or loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// A domain-level error from `transit_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Missing or malformed configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for worker results.
pub type WorkerResult<T> = Result<T, WorkerError>;
