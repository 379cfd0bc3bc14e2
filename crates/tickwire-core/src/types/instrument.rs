//! Instrument identifiers — normalized (base, quote) currency pairs.
//!
//! The upstream feed addresses instruments as delimited strings such as
//! `"BTC_ETH"`. Parsing is strict and typed: a malformed wire string is
//! distinguishable (via [`PairParseError`]) from a well-formed pair that the
//! adapter simply does not recognize — the latter is a membership question
//! answered against the configured instrument universe, not a parse failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a single asset code (e.g. `"BTC"`).
const MAX_CODE_LEN: usize = 10;

/// A normalized (base, quote) asset pair with value equality.
///
/// Codes are stored upper-cased, so `"btc_eth"` and `"BTC_ETH"` parse to
/// equal values. Displays as `BASE/QUOTE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    base: String,
    quote: String,
}

/// Why a wire string failed to parse as a [`CurrencyPair`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairParseError {
    #[error("missing delimiter in pair string `{0}`")]
    MissingDelimiter(String),

    #[error("empty asset code in pair string `{0}`")]
    EmptyCode(String),

    #[error("invalid asset code `{code}` in pair string `{pair}`")]
    InvalidCode { pair: String, code: String },
}

impl CurrencyPair {
    /// Build a pair from two asset codes, normalizing to upper case.
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_ascii_uppercase(),
            quote: quote.into().to_ascii_uppercase(),
        }
    }

    /// Parse a wire pair string such as `"BTC_ETH"` or `"BTC-ETH"`.
    ///
    /// Exactly one delimiter must be present and both halves must be
    /// non-empty ASCII-alphanumeric codes of at most 10 characters.
    pub fn parse(s: &str) -> Result<Self, PairParseError> {
        let delim = s
            .find(['_', '-'])
            .ok_or_else(|| PairParseError::MissingDelimiter(s.to_string()))?;

        let (base, quote) = (&s[..delim], &s[delim + 1..]);
        for code in [base, quote] {
            if code.is_empty() {
                return Err(PairParseError::EmptyCode(s.to_string()));
            }
            if code.len() > MAX_CODE_LEN || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(PairParseError::InvalidCode {
                    pair: s.to_string(),
                    code: code.to_string(),
                });
            }
        }

        Ok(Self::new(base, quote))
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Wire form with underscore delimiter (e.g. `"BTC_ETH"`).
    pub fn wire_symbol(&self) -> String {
        format!("{}_{}", self.base, self.quote)
    }
}

impl std::fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_underscore_form() {
        let pair = CurrencyPair::parse("BTC_ETH").unwrap();
        assert_eq!(pair.base(), "BTC");
        assert_eq!(pair.quote(), "ETH");
        assert_eq!(pair.to_string(), "BTC/ETH");
        assert_eq!(pair.wire_symbol(), "BTC_ETH");
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(
            CurrencyPair::parse("btc_eth").unwrap(),
            CurrencyPair::new("BTC", "ETH"),
        );
    }

    #[test]
    fn parse_dash_form() {
        let pair = CurrencyPair::parse("BTC-USDT").unwrap();
        assert_eq!(pair.quote(), "USDT");
    }

    #[test]
    fn missing_delimiter_is_typed() {
        assert_eq!(
            CurrencyPair::parse("BTCETH"),
            Err(PairParseError::MissingDelimiter("BTCETH".to_string())),
        );
    }

    #[test]
    fn empty_code_rejected() {
        assert!(matches!(
            CurrencyPair::parse("BTC_"),
            Err(PairParseError::EmptyCode(_)),
        ));
        assert!(matches!(
            CurrencyPair::parse("_ETH"),
            Err(PairParseError::EmptyCode(_)),
        ));
    }

    #[test]
    fn oversized_or_symbolic_code_rejected() {
        assert!(matches!(
            CurrencyPair::parse("BTC_AVERYLONGCODE"),
            Err(PairParseError::InvalidCode { .. }),
        ));
        assert!(matches!(
            CurrencyPair::parse("BT%_ETH"),
            Err(PairParseError::InvalidCode { .. }),
        ));
    }

    #[test]
    fn value_equality() {
        assert_eq!(
            CurrencyPair::parse("BTC_ETH").unwrap(),
            CurrencyPair::parse("BTC_ETH").unwrap(),
        );
        assert_ne!(
            CurrencyPair::parse("BTC_ETH").unwrap(),
            CurrencyPair::parse("ETH_BTC").unwrap(),
        );
    }
}
