//! Error types for sp-ws

use thiserror::Error;

/// WebSocket gateway error type
#[derive(Error, Debug)]
pub enum WsError {
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] sp_core::Error),

    #[error("Browser error: {0}")]
    Browser(#[from] sp_browser::BrowserError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for sp-ws
pub type Result<T> = std::result::Result<T, WsError>;
