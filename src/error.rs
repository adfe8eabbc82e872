use thiserror::Error;

/// Core error type. Mirrors the error kinds enumerated in the cache
/// engine's design: invalid arguments are reported, not retried; I/O
/// and parse failures propagate to the caller; a corrupt log is
/// handled internally (see `log::read`) and never surfaces here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("lock error: {0}")]
    Lock(String),

    #[error("fetch callback failed: {0}")]
    Fetch(String),
}

pub type Result<T> = std::result::Result<T, Error>;
