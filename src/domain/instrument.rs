//! Tradable instrument identifiers and instrument-list parsing.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Lowercase market symbol, e.g. `btcusd`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    pub fn new(symbol: &str) -> Self {
        Instrument(symbol.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Instrument {
    fn from(symbol: &str) -> Self {
        Instrument::new(symbol)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InstrumentListError {
    #[error("empty token in instrument list")]
    EmptyToken,

    #[error("duplicate instrument: {0}")]
    Duplicate(String),
}

/// Parse a comma-separated instrument list. Symbols are normalised to lowercase.
pub fn parse_instruments(input: &str) -> Result<Vec<Instrument>, InstrumentListError> {
    let mut instruments = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(InstrumentListError::EmptyToken);
        }
        let instrument = Instrument::new(trimmed);
        if !seen.insert(instrument.clone()) {
            return Err(InstrumentListError::Duplicate(instrument.0));
        }
        instruments.push(instrument);
    }

    Ok(instruments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalises_case_and_whitespace() {
        assert_eq!(Instrument::new(" BTCUSD ").as_str(), "btcusd");
    }

    #[test]
    fn display_is_symbol() {
        assert_eq!(Instrument::from("EthUsd").to_string(), "ethusd");
    }

    #[test]
    fn parse_single() {
        let parsed = parse_instruments("btcusd").unwrap();
        assert_eq!(parsed, vec![Instrument::new("btcusd")]);
    }

    #[test]
    fn parse_multiple_preserves_order() {
        let parsed = parse_instruments("ethusd, BTCUSD ,ltcusd").unwrap();
        let symbols: Vec<&str> = parsed.iter().map(|i| i.as_str()).collect();
        assert_eq!(symbols, vec!["ethusd", "btcusd", "ltcusd"]);
    }

    #[test]
    fn parse_rejects_empty_token() {
        assert_eq!(
            parse_instruments("btcusd,,ethusd"),
            Err(InstrumentListError::EmptyToken)
        );
        assert_eq!(parse_instruments(""), Err(InstrumentListError::EmptyToken));
    }

    #[test]
    fn parse_rejects_duplicates_case_insensitively() {
        assert_eq!(
            parse_instruments("btcusd,BTCUSD"),
            Err(InstrumentListError::Duplicate("btcusd".into()))
        );
    }
}
