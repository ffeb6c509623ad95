//! Discrete trade signals exchanged between the evaluator, manual inputs and
//! the position manager.

use crate::domain::instrument::Instrument;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SignalKind {
    BuyMacd,
    BuyRsi,
    BuyEma,
    BuyManual,
    SellMacd,
    SellRsi,
    SellStoploss,
    SellManual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl SignalKind {
    pub const ALL: [SignalKind; 8] = [
        SignalKind::BuyMacd,
        SignalKind::BuyRsi,
        SignalKind::BuyEma,
        SignalKind::BuyManual,
        SignalKind::SellMacd,
        SignalKind::SellRsi,
        SignalKind::SellStoploss,
        SignalKind::SellManual,
    ];

    pub fn side(self) -> Side {
        match self {
            SignalKind::BuyMacd
            | SignalKind::BuyRsi
            | SignalKind::BuyEma
            | SignalKind::BuyManual => Side::Buy,
            SignalKind::SellMacd
            | SignalKind::SellRsi
            | SignalKind::SellStoploss
            | SignalKind::SellManual => Side::Sell,
        }
    }

    /// Exits that may realise a loss. Indicator-driven sells only execute at or
    /// above the entry price.
    pub fn is_unconditional_exit(self) -> bool {
        matches!(self, SignalKind::SellStoploss | SignalKind::SellManual)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::BuyMacd => "buy-macd",
            SignalKind::BuyRsi => "buy-rsi",
            SignalKind::BuyEma => "buy-ema",
            SignalKind::BuyManual => "buy-manual",
            SignalKind::SellMacd => "sell-macd",
            SignalKind::SellRsi => "sell-rsi",
            SignalKind::SellStoploss => "sell-stoploss",
            SignalKind::SellManual => "sell-manual",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown signal kind: {0}")]
pub struct UnknownSignalKind(pub String);

impl FromStr for SignalKind {
    type Err = UnknownSignalKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownSignalKind(s.to_string()))
    }
}

impl TryFrom<String> for SignalKind {
    type Error = UnknownSignalKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SignalKind> for String {
    fn from(kind: SignalKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A transient buy/sell instruction for one instrument. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEvent {
    pub instrument: Instrument,
    pub kind: SignalKind,
}

impl SignalEvent {
    pub fn new(instrument: Instrument, kind: SignalKind) -> Self {
        SignalEvent { instrument, kind }
    }

    /// Parse an operator command such as `buy btcusd` or `sell ethusd` into a
    /// manual override signal.
    pub fn parse_manual(line: &str) -> Option<SignalEvent> {
        let mut parts = line.split_whitespace();
        let action = parts.next()?;
        let symbol = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        let kind = match action.to_lowercase().as_str() {
            "buy" => SignalKind::BuyManual,
            "sell" => SignalKind::SellManual,
            _ => return None,
        };
        Some(SignalEvent::new(Instrument::new(symbol), kind))
    }
}
