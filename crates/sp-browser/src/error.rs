//! Error types for sp-browser

use thiserror::Error;

/// sp-browser error type
///
/// Session-scoped variants carry the session id so multi-session logs
/// and client-facing translations stay attributable.
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("failed to launch browser engine: {0}")]
    EngineLaunch(String),

    #[error("session {session}: navigation to {url} failed: {cause}")]
    Navigation {
        session: String,
        url: String,
        cause: String,
    },

    #[error("session {session}: navigation to {url} timed out after {timeout_secs}s")]
    NavigationTimeout {
        session: String,
        url: String,
        timeout_secs: u64,
    },

    #[error("session {session}: viewport size is not available")]
    ViewportUnavailable { session: String },

    #[error("screenshot encoding failed: {0}")]
    Encode(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session {0} is closed")]
    SessionClosed(String),

    #[error("session {session}: {action} failed: {cause}")]
    Interaction {
        session: String,
        action: String,
        cause: String,
    },

    #[error("browser engine call failed: {0}")]
    Engine(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, BrowserError>;
