//! Open positions and closed-trade records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::instrument::Instrument;
use crate::domain::signal::SignalKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Open,
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionState::Flat => f.write_str("flat"),
            PositionState::Open => f.write_str("open"),
        }
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to_precision(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// price * (1 - stop_loss_percent), unrounded.
pub fn stop_candidate(price: f64, stop_loss_percent: f64) -> f64 {
    price * (1.0 - stop_loss_percent)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub instrument: Instrument,
    pub entry_price: f64,
    pub stop_loss_price: f64,
    pub buy_type: SignalKind,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn open(
        instrument: Instrument,
        entry_price: f64,
        stop_loss_percent: f64,
        decimals: u32,
        buy_type: SignalKind,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Position {
            instrument,
            entry_price,
            stop_loss_price: round_to_precision(
                stop_candidate(entry_price, stop_loss_percent),
                decimals,
            ),
            buy_type,
            opened_at,
        }
    }

    pub fn should_stop_out(&self, price: f64) -> bool {
        price < self.stop_loss_price
    }

    /// The stop a trailing update at `price` would move to, if it is higher
    /// than the current one. Never returns a lower stop.
    pub fn ratcheted_stop(
        &self,
        price: f64,
        stop_loss_percent: f64,
        decimals: u32,
    ) -> Option<f64> {
        let candidate = stop_candidate(price, stop_loss_percent);
        if candidate <= self.stop_loss_price {
            return None;
        }
        let rounded = round_to_precision(candidate, decimals).max(self.stop_loss_price);
        (rounded > self.stop_loss_price).then_some(rounded)
    }

    pub fn close(
        &self,
        sell_type: SignalKind,
        exit_price: f64,
        timeframe: &str,
        stop_loss_percent: f64,
    ) -> TradeEvent {
        TradeEvent {
            instrument: self.instrument.clone(),
            buy_type: self.buy_type,
            sell_type,
            buy_price: self.entry_price,
            sell_price: exit_price,
            timeframe: timeframe.to_string(),
            stop_loss_percent,
        }
    }
}

/// Immutable record of a closed trade, one ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub instrument: Instrument,
    pub buy_type: SignalKind,
    pub sell_type: SignalKind,
    pub buy_price: f64,
    pub sell_price: f64,
    pub timeframe: String,
    pub stop_loss_percent: f64,
}

impl TradeEvent {
    pub fn profit(&self) -> f64 {
        self.sell_price - self.buy_price
    }
}
