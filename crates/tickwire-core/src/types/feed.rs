//! Feed categories a consumer can register interest in.

use serde::{Deserialize, Serialize};

/// The kind of feed a subscription refers to.
///
/// Only `Ticker` is wired end-to-end today; the registry and subscription
/// records carry the tag generically so order-book and trade feeds can be
/// added without touching the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Ticker,
    OrderBook,
    Trades,
}

impl FeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Ticker => "ticker",
            FeedKind::OrderBook => "order_book",
            FeedKind::Trades => "trades",
        }
    }
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
