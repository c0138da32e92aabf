// src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Kilovolt error: {0}")]
    Kilovolt(#[from] miragemod_kilovolt::ClientError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
