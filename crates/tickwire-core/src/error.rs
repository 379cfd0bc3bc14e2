//! Typed error definitions for the Tickwire system.
//!
//! Provides [`FeedError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.

use thiserror::Error;

/// Domain-specific errors for the Tickwire system.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Session open, handshake, or communication error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Topic subscription error on an open session.
    #[error("subscribe error: {0}")]
    Subscribe(String),

    /// Malformed field in an otherwise well-addressed ticker payload.
    ///
    /// Carries the positional index and field name so feed-format contract
    /// violations surface loudly and precisely.
    #[error("payload field `{field}` (position {index}): {detail}")]
    Payload {
        field: &'static str,
        index: usize,
        detail: String,
    },

    /// Lifecycle misuse: `start()` called on an already-started adapter.
    #[error("adapter already started")]
    AlreadyStarted,
}
