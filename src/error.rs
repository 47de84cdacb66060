//! Client error type and `Result` alias.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong inside the client.
///
/// None of these are fatal once the window is up: each is logged by the
/// component that hit it and the session carries on.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid value for {var}: {reason}")]
    Config { var: &'static str, reason: String },
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid image payload: {0}")]
    Payload(#[from] base64::DecodeError),
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("connection failed: {0}")]
    Transport(#[from] Box<tokio_tungstenite::tungstenite::Error>),
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(Box::new(e))
    }
}
