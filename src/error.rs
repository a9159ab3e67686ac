//! Error types for the `breeze-rs` crate.
//!
//! All fallible operations in this crate return [`Result<T>`], which is an
//! alias for `std::result::Result<T, BreezeError>`.
//!
//! [`BreezeError`] covers:
//! - **Validation errors**: Missing or malformed caller-supplied fields
//! - **Registry misses**: Unknown exchange ids or wire tokens
//! - **Connection errors**: Subscribing on a channel that is not open
//! - **Load errors**: Security-master download or parse failures
//! - **Transport errors**: HTTP, WebSocket, JSON and URL failures

use crate::types::enums::ChannelKind;

/// A caller-supplied field was missing or invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field was not supplied.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A field was supplied but its value is not acceptable.
    #[error("invalid value for `{field}`: {value:?}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Neither exchange quotes nor market depth were requested.
    #[error("either exchange quotes or market depth must be requested")]
    QuoteOrDepthRequired,
}

/// Failure to download or parse the security-master reference feed.
///
/// A failed load never touches the tables published by an earlier load.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The feed could not be fetched.
    #[error("security master download failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The feed endpoint answered with a non-success status.
    #[error("security master download returned HTTP {0}")]
    Status(u16),

    /// A row could not be decoded.
    #[error("malformed security master row {line}: {reason}")]
    MalformedRow {
        /// 1-based line number in the feed.
        line: usize,
        /// What was wrong with the row.
        reason: String,
    },

    /// The feed contained no instrument rows.
    #[error("security master contained no instruments")]
    Empty,
}

/// All possible errors produced by the `breeze-rs` client.
#[derive(Debug, thiserror::Error)]
pub enum BreezeError {
    /// A caller-supplied field was missing or invalid.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The OHLC interval is not one of the supported stream intervals.
    #[error("invalid stream interval {0:?} (expected 1second, 1minute, 5minute or 30minute)")]
    InvalidInterval(String),

    /// The exchange code or numeric exchange id is not recognised.
    #[error("unknown exchange {0:?}")]
    UnknownExchange(String),

    /// The wire token is not present in the security master.
    #[error("instrument not found on {exchange} for token {token:?}")]
    UnknownInstrument {
        /// Exchange (partition) the lookup was made against.
        exchange: String,
        /// The raw token or stream symbol that missed.
        token: String,
    },

    /// A subscription change was attempted on a channel that is not open.
    #[error("{0} channel is not connected")]
    NotConnected(ChannelKind),

    /// The security master could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// An inbound frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The session bootstrap was rejected.
    #[error("session error: {0}")]
    Session(String),

    /// The server returned an unexpected HTTP status code.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// The HTTP status code.
        status: reqwest::StatusCode,
        /// The response body text.
        body: String,
    },

    /// A network or transport-level error from `reqwest`.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to serialize or deserialize JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A WebSocket-level error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// An error building or parsing a URL.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BreezeError>;
