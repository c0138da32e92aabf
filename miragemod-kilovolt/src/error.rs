// src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    #[error("Broker returned an error: {0}")]
    Server(String),

    #[error("Key is empty or unset")]
    EmptyKey,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Unexpected response payload: {0}")]
    UnexpectedResponse(String),
}
