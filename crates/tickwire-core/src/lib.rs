//! # tickwire-core
//!
//! Core crate for the Tickwire market-data adapter, providing:
//!
//! - **Types** (`types`) — currency pairs, feed kinds, normalized tick records
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Error types** (`error`) — domain-specific `FeedError` via thiserror
//! - **Session abstraction** (`session`) — transport / session / handler traits
//! - **WebSocket transport** (`ws`) — tokio-tungstenite session implementation
//! - **In-memory transport** (`memory`) — single-process hub for tests
//! - **Time utilities** (`time_util`) — epoch timestamps
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod session;
pub mod time_util;
pub mod types;
pub mod ws;

// Re-export types at crate root for convenience.
pub use types::*;
