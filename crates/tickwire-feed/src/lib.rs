//! # tickwire-feed
//!
//! The exchange-facing adapter core: connects to the upstream pub/sub
//! service, normalizes ticker payloads, and fans them out to local
//! subscribers.
//!
//! ## Architecture
//!
//! ```text
//! transport session ──raw payload──► TickNormalizer ──Tick──► SubscriptionRegistry
//!        ▲                                                        │ matching()
//!        │ open / close / reconnect                               ▼
//!   TickerFeed (lifecycle state machine)              subscribers (on_tick)
//! ```
//!
//! - [`registry`] — thread-safe (kind, pair, subscriber) registry
//! - [`normalizer`] — positional payload → validated [`tickwire_core::Tick`]
//! - [`adapter`] — [`adapter::TickerFeed`] session lifecycle manager

pub mod adapter;
pub mod normalizer;
pub mod registry;

pub use adapter::{SessionState, TickerFeed};
pub use normalizer::{Normalized, SkipReason, TickNormalizer};
pub use registry::{SubscriptionRegistry, TickSubscriber};
