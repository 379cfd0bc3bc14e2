//! Core data types flowing through the adapter.

pub mod feed;
pub mod instrument;
pub mod tick;

pub use feed::FeedKind;
pub use instrument::{CurrencyPair, PairParseError};
pub use tick::Tick;
