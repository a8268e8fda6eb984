//! Unified SDK error types.

use thiserror::Error;

/// Top-level SDK error.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// HTTP-layer errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[cfg(feature = "http")]
    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Undecodable response: {0}")]
    Decode(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Timeout")]
    Timeout,

    #[error("Server error {status}: {body}")]
    Unknown { status: u16, body: String },

    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

/// Feed transport and subscription errors.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Connection closed: code={code:?} reason={reason}")]
    Closed { code: Option<u16>, reason: String },
}

/// Account-session errors (application-level auth).
#[derive(Error, Debug)]
pub enum SessionError {
    /// No cached session and no retained credentials to establish one.
    #[error("No user session")]
    SessionNotFound,

    #[error("Invalid email or password")]
    InvalidEmailPassword,

    #[error("Quick sign-up not completed")]
    QuickSignUpIncomplete,

    /// Account temporarily locked; carries the server-supplied unlock date.
    #[error("Account locked until {until}")]
    TempLock { until: chrono::NaiveDate },

    /// Server-supplied free-text error for an unrecognized login status.
    #[error("{0}")]
    ErrorMessage(String),
}
