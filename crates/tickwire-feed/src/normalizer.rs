//! Ticker payload normalization.
//!
//! The upstream feed delivers each ticker update as a fixed-order array of
//! ten untyped scalars:
//!
//! ```text
//! [pair, last, lowest_ask, highest_bid, percent_change,
//!  base_volume, quote_volume, frozen, high_24h, low_24h]
//! ```
//!
//! Failure handling is deliberately asymmetric. An instrument string that is
//! malformed or not in the recognized universe means this one update is not
//! for us — the payload is skipped with a diagnostic log and processing
//! continues. A malformed field *past* the instrument indicates the feed is
//! violating its format contract, so it propagates as a hard
//! [`FeedError::Payload`] naming the offending field.

use std::collections::HashSet;
use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::debug;

use tickwire_core::error::FeedError;
use tickwire_core::time_util;
use tickwire_core::{CurrencyPair, PairParseError, Tick};

/// Number of positional fields in one ticker payload.
const FIELD_COUNT: usize = 10;

/// Field names by position, for error reporting.
const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "pair",
    "last_price",
    "lowest_ask",
    "highest_bid",
    "percent_change",
    "base_volume",
    "quote_volume",
    "frozen",
    "high_24h",
    "low_24h",
];

/// Outcome of normalizing one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// A validated tick, ready for fan-out.
    Tick(Tick),
    /// The payload was discarded; not an error, not retried.
    Skip(SkipReason),
}

/// Why a payload was skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The instrument string did not parse at all.
    MalformedInstrument(PairParseError),
    /// The instrument parsed but is outside the recognized universe.
    UnrecognizedInstrument(CurrencyPair),
}

/// Converts raw positional payloads into [`Tick`] records.
///
/// Holds the exchange identity (fixed per adapter instance) and the set of
/// recognized instruments.
pub struct TickNormalizer {
    source: String,
    instruments: HashSet<CurrencyPair>,
}

impl TickNormalizer {
    pub fn new(source: impl Into<String>, instruments: impl IntoIterator<Item = CurrencyPair>) -> Self {
        Self {
            source: source.into(),
            instruments: instruments.into_iter().collect(),
        }
    }

    /// Which upstream source this normalizer stamps into its ticks.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Normalize one raw payload.
    ///
    /// The observation timestamp is stamped from the wall clock at the
    /// moment of processing — the feed itself carries no timestamp.
    pub fn normalize(&self, raw: &[serde_json::Value]) -> Result<Normalized, FeedError> {
        if raw.len() != FIELD_COUNT {
            return Err(FeedError::Payload {
                field: "payload",
                index: 0,
                detail: format!("expected {FIELD_COUNT} fields, got {}", raw.len()),
            });
        }

        let pair_str = raw[0].as_str().unwrap_or_default();
        let pair = match CurrencyPair::parse(pair_str) {
            Ok(pair) => pair,
            Err(e) => {
                debug!("skipping tick with malformed instrument `{pair_str}`: {e}");
                return Ok(Normalized::Skip(SkipReason::MalformedInstrument(e)));
            }
        };
        if !self.instruments.contains(&pair) {
            debug!("skipping tick for unrecognized instrument {pair}");
            return Ok(Normalized::Skip(SkipReason::UnrecognizedInstrument(pair)));
        }

        let tick = Tick {
            source: self.source.clone(),
            pair,
            received_at_s: time_util::now_s(),
            last_price: decimal_at(raw, 1)?,
            lowest_ask: decimal_at(raw, 2)?,
            highest_bid: decimal_at(raw, 3)?,
            percent_change: decimal_at(raw, 4)?,
            base_volume: decimal_at(raw, 5)?,
            quote_volume: decimal_at(raw, 6)?,
            is_frozen: decimal_at(raw, 7)? > Decimal::ZERO,
            high_24h: decimal_at(raw, 8)?,
            low_24h: decimal_at(raw, 9)?,
        };
        Ok(Normalized::Tick(tick))
    }
}

/// Read the positional field at `index` as an exact decimal.
///
/// Feeds encode numerics as either JSON strings (`"0.051"`) or native
/// numbers; both are accepted. Anything else is a feed-format contract
/// violation and becomes a hard error naming the field.
fn decimal_at(raw: &[serde_json::Value], index: usize) -> Result<Decimal, FeedError> {
    let field = FIELD_NAMES[index];
    let v = &raw[index];

    let parsed = if let Some(s) = v.as_str() {
        parse_decimal(s)
    } else if v.is_number() {
        parse_decimal(&v.to_string())
    } else {
        None
    };

    parsed.ok_or_else(|| FeedError::Payload {
        field,
        index,
        detail: format!("not a decimal: {v}"),
    })
}

/// Parse a decimal string, falling back to scientific notation — serde_json
/// renders small native numbers as e.g. `1.5e-9`, which plain `from_str`
/// rejects.
fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn normalizer() -> TickNormalizer {
        TickNormalizer::new(
            "poloniex",
            [
                CurrencyPair::new("BTC", "ETH"),
                CurrencyPair::new("BTC", "XMR"),
            ],
        )
    }

    fn valid_payload() -> Vec<serde_json::Value> {
        vec![
            json!("BTC_ETH"),
            json!("0.05"),
            json!("0.051"),
            json!("0.049"),
            json!("0.02"),
            json!("100"),
            json!("5"),
            json!("0"),
            json!("0.06"),
            json!("0.04"),
        ]
    }

    #[test]
    fn valid_payload_round_trips_exactly() {
        let out = normalizer().normalize(&valid_payload()).unwrap();
        let Normalized::Tick(tick) = out else {
            panic!("expected a tick");
        };

        assert_eq!(tick.source, "poloniex");
        assert_eq!(tick.pair, CurrencyPair::new("BTC", "ETH"));
        assert_eq!(tick.last_price, dec!(0.05));
        assert_eq!(tick.lowest_ask, dec!(0.051));
        assert_eq!(tick.highest_bid, dec!(0.049));
        assert_eq!(tick.percent_change, dec!(0.02));
        assert_eq!(tick.base_volume, dec!(100));
        assert_eq!(tick.quote_volume, dec!(5));
        assert!(!tick.is_frozen);
        assert_eq!(tick.high_24h, dec!(0.06));
        assert_eq!(tick.low_24h, dec!(0.04));
        assert!(tick.received_at_s > 0);
    }

    #[test]
    fn high_precision_strings_do_not_lose_digits() {
        let mut payload = valid_payload();
        payload[1] = json!("0.000000012345678901");
        let Normalized::Tick(tick) = normalizer().normalize(&payload).unwrap() else {
            panic!("expected a tick");
        };
        assert_eq!(tick.last_price, Decimal::from_str("0.000000012345678901").unwrap());
    }

    #[test]
    fn frozen_iff_flag_greater_than_zero() {
        for (value, expected) in [(json!("0"), false), (json!("1"), true), (json!(2), true)] {
            let mut payload = valid_payload();
            payload[7] = value;
            let Normalized::Tick(tick) = normalizer().normalize(&payload).unwrap() else {
                panic!("expected a tick");
            };
            assert_eq!(tick.is_frozen, expected);
        }
    }

    #[test]
    fn native_number_fields_accepted() {
        let mut payload = valid_payload();
        payload[5] = json!(100);
        let Normalized::Tick(tick) = normalizer().normalize(&payload).unwrap() else {
            panic!("expected a tick");
        };
        assert_eq!(tick.base_volume, dec!(100));
    }

    #[test]
    fn scientific_notation_is_accepted() {
        // serde_json renders small native numbers in scientific notation.
        for value in [json!(1.5e-9), json!("1.5e-9")] {
            let mut payload = valid_payload();
            payload[1] = value;
            let Normalized::Tick(tick) = normalizer().normalize(&payload).unwrap() else {
                panic!("expected a tick");
            };
            assert_eq!(tick.last_price, Decimal::from_str("0.0000000015").unwrap());
        }
    }

    #[test]
    fn malformed_instrument_is_a_skip() {
        let mut payload = valid_payload();
        payload[0] = json!("BTCETH");
        match normalizer().normalize(&payload).unwrap() {
            Normalized::Skip(SkipReason::MalformedInstrument(_)) => {}
            other => panic!("expected malformed-instrument skip, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_instrument_is_a_distinct_skip() {
        let mut payload = valid_payload();
        payload[0] = json!("XYZ_UNKNOWN");
        match normalizer().normalize(&payload).unwrap() {
            Normalized::Skip(SkipReason::UnrecognizedInstrument(pair)) => {
                assert_eq!(pair, CurrencyPair::new("XYZ", "UNKNOWN"));
            }
            other => panic!("expected unrecognized-instrument skip, got {other:?}"),
        }
    }

    #[test]
    fn non_string_instrument_is_a_skip() {
        let mut payload = valid_payload();
        payload[0] = json!(42);
        assert!(matches!(
            normalizer().normalize(&payload).unwrap(),
            Normalized::Skip(SkipReason::MalformedInstrument(_)),
        ));
    }

    #[test]
    fn malformed_numeric_field_is_a_hard_error() {
        let mut payload = valid_payload();
        payload[2] = json!("not-a-number");
        let err = normalizer().normalize(&payload).unwrap_err();
        match err {
            FeedError::Payload { field, index, .. } => {
                assert_eq!(field, "lowest_ask");
                assert_eq!(index, 2);
            }
            other => panic!("expected payload error, got {other:?}"),
        }
    }

    #[test]
    fn wrong_field_count_is_a_hard_error() {
        let payload = vec![json!("BTC_ETH"), json!("0.05")];
        assert!(normalizer().normalize(&payload).is_err());
    }
}
