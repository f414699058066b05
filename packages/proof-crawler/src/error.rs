//! Typed errors for the crawl engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell a
//! transient session fault apart from a precondition violation like
//! [`CrawlerError::NoData`].

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in crawl, proof and audit operations.
#[derive(Debug, Error)]
pub enum CrawlerError {
    /// Session could not be established or was lost
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Browser driver failed outside of session negotiation
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Durable or content-addressed storage failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Proof requested for a round with zero recorded items
    #[error("no item CIDs recorded for round {round}")]
    NoData { round: u64 },

    /// URL could not be parsed or resolved
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Configured CSS selector does not parse
    #[error("invalid selector: {selector}")]
    InvalidSelector { selector: String },

    /// Background crawl task panicked or was aborted
    #[error("crawl task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while negotiating or using an authenticated session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Driver-level failure during negotiation
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    /// An expected login form element never appeared
    #[error("login form element missing: {selector}")]
    MissingElement { selector: String },

    /// Last negotiation attempt is too recent to try again
    #[error("session not yet usable, retry in {retry_in:?}")]
    NotYetUsable { retry_in: Duration },

    /// Platform bounced a page load back into the login flow
    #[error("session expired while loading {url}")]
    Expired { url: String },

    /// Consecutive failed negotiations reached the configured budget
    #[error("login failed {attempts} times in a row, giving up")]
    RetryBudgetExhausted { attempts: u32 },
}

impl SessionError {
    /// Whether the crawl loop may keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SessionError::RetryBudgetExhausted { .. })
    }
}

/// Errors from the rendered-page client.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Transport failure talking to the driver
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Driver answered with a WebDriver error payload
    #[error("webdriver error (status {status}): {error}: {message}")]
    WebDriver {
        status: u16,
        error: String,
        message: String,
    },

    /// Driver answered with something we could not interpret
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Page method used after the browser was closed
    #[error("browser session closed")]
    Closed,
}

/// Errors from the durable stores and the content-addressed store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend-specific failure (database, filesystem)
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Transport failure talking to the storage service
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Storage service rejected the request
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// No content under this CID (or file name)
    #[error("content not found: {cid}")]
    NotFound { cid: String },

    /// Blob could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Result type alias for browser operations.
pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
