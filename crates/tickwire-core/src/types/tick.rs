//! Normalized ticker snapshot.
//!
//! All price and volume fields are [`Decimal`] — financial quantities are
//! never represented as floating point, so values round-trip from the wire
//! with no representation error.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::instrument::CurrencyPair;

/// One normalized ticker update for one instrument at one observation time.
///
/// Created once per inbound message and immutable thereafter. The instrument
/// pair is always a successfully parsed, recognized value — payloads with
/// malformed instruments never become a `Tick`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Which upstream exchange this snapshot came from.
    pub source: String,
    /// The instrument the snapshot describes.
    pub pair: CurrencyPair,
    /// Observation timestamp in seconds since Unix epoch, stamped at
    /// receipt time (the feed itself carries no timestamp).
    pub received_at_s: u64,
    /// Last trade price.
    pub last_price: Decimal,
    /// Lowest current ask.
    pub lowest_ask: Decimal,
    /// Highest current bid.
    pub highest_bid: Decimal,
    /// 24h percent change.
    pub percent_change: Decimal,
    /// 24h volume in the base asset.
    pub base_volume: Decimal,
    /// 24h volume in the quote asset.
    pub quote_volume: Decimal,
    /// Whether trading in the instrument is currently frozen/halted.
    pub is_frozen: bool,
    /// 24h high.
    pub high_24h: Decimal,
    /// 24h low.
    pub low_24h: Decimal,
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tick({} {} last={} ask={} bid={} frozen={})",
            self.source, self.pair, self.last_price, self.lowest_ask, self.highest_bid, self.is_frozen
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn display_is_compact() {
        let tick = Tick {
            source: "poloniex".to_string(),
            pair: CurrencyPair::new("BTC", "ETH"),
            received_at_s: 1_700_000_000,
            last_price: dec!(0.05),
            lowest_ask: dec!(0.051),
            highest_bid: dec!(0.049),
            percent_change: dec!(0.02),
            base_volume: dec!(100),
            quote_volume: dec!(5),
            is_frozen: false,
            high_24h: dec!(0.06),
            low_24h: dec!(0.04),
        };
        assert_eq!(
            tick.to_string(),
            "Tick(poloniex BTC/ETH last=0.05 ask=0.051 bid=0.049 frozen=false)",
        );
    }
}
