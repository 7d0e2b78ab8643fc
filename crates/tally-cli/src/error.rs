use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tally_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid mutation data: {0}")]
    InvalidData(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Media storage is not configured. Set R2_ACCOUNT_ID, R2_BUCKET, R2_ACCESS_KEY_ID and R2_SECRET_ACCESS_KEY."
    )]
    MediaNotConfigured,
    #[error("Push failed for {0} entity type(s)")]
    PushFailed(usize),
}
