use std::path::PathBuf;

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the pipeline can
/// tell storage failures (surfaced) apart from fetch failures (absorbed).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("link not found: {0}")]
    NotFound(String),

    #[error("invalid snapshot: {path}: {reason}")]
    Snapshot { path: PathBuf, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
