//! Indicator engine.
//!
//! Turns a raw candle history (newest-first, as delivered by market feeds)
//! into an [`IndicatorSeries`]: parallel, index-aligned vectors of length
//! `display_window`, index 0 oldest, last index the current bar.
//!
//! Everything here is pure and can run concurrently across instruments.

pub mod ema;
pub mod macd;
pub mod rsi;

pub use ema::compute_ema;
pub use macd::{compute_macd, compute_macd_signal};
pub use rsi::compute_rsi;

use crate::domain::candle::{oldest_first, Candle};
use crate::domain::error::TraderError;
use crate::domain::instrument::Instrument;
use serde::Serialize;
use std::collections::BTreeMap;

pub const DEFAULT_DISPLAY_WINDOW: usize = 60;
pub const DEFAULT_PERIODS_LONG: usize = 26;
pub const DEFAULT_PERIODS_SHORT: usize = 12;
pub const DEFAULT_PERIODS_SIGNAL: usize = 9;
pub const DEFAULT_PERIODS_RSI: usize = 20;
pub const DEFAULT_EMA_SMOOTHING: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    pub display_window: usize,
    pub periods_long: usize,
    pub periods_short: usize,
    pub periods_signal: usize,
    pub periods_rsi: usize,
    pub ema_smoothing: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            display_window: DEFAULT_DISPLAY_WINDOW,
            periods_long: DEFAULT_PERIODS_LONG,
            periods_short: DEFAULT_PERIODS_SHORT,
            periods_signal: DEFAULT_PERIODS_SIGNAL,
            periods_rsi: DEFAULT_PERIODS_RSI,
            ema_smoothing: DEFAULT_EMA_SMOOTHING,
        }
    }
}

impl IndicatorConfig {
    /// Minimum number of candles `compute_indicators` accepts.
    pub fn required_history(&self) -> usize {
        self.display_window
            + self
                .periods_long
                .max(self.periods_short)
                .max(self.periods_rsi)
    }
}

/// One bar across every series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    pub close: f64,
    pub ema_long: f64,
    pub ema_short: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub rsi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSeries {
    pub close_prices: Vec<f64>,
    pub ema_long: Vec<f64>,
    pub ema_short: Vec<f64>,
    pub macd: Vec<f64>,
    pub macd_signal: Vec<f64>,
    pub rsi: Vec<f64>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.close_prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close_prices.is_empty()
    }

    /// All series share one length.
    pub fn is_aligned(&self) -> bool {
        let len = self.len();
        [
            &self.ema_long,
            &self.ema_short,
            &self.macd,
            &self.macd_signal,
            &self.rsi,
        ]
        .iter()
        .all(|s| s.len() == len)
    }

    pub fn point(&self, index: usize) -> Option<IndicatorPoint> {
        Some(IndicatorPoint {
            close: *self.close_prices.get(index)?,
            ema_long: *self.ema_long.get(index)?,
            ema_short: *self.ema_short.get(index)?,
            macd: *self.macd.get(index)?,
            macd_signal: *self.macd_signal.get(index)?,
            rsi: *self.rsi.get(index)?,
        })
    }

    pub fn latest(&self) -> Option<IndicatorPoint> {
        self.len().checked_sub(1).and_then(|i| self.point(i))
    }
}

/// Latest series per instrument, as handed to presentation.
pub type IndicatorSnapshot = BTreeMap<Instrument, IndicatorSeries>;

/// Compute every series for one instrument. `candles` are newest-first.
pub fn compute_indicators(
    candles: &[Candle],
    config: &IndicatorConfig,
) -> Result<IndicatorSeries, TraderError> {
    let minimum = config.required_history();
    if candles.len() < minimum {
        return Err(TraderError::InsufficientHistory {
            bars: candles.len(),
            minimum,
        });
    }

    let ordered = oldest_first(candles);
    let closes: Vec<f64> = ordered.iter().map(|c| c.close).collect();
    let window = config.display_window;

    let close_prices = closes[closes.len() - window..].to_vec();
    let ema_long = compute_ema(&closes, config.periods_long, window, config.ema_smoothing)?;
    let ema_short = compute_ema(&closes, config.periods_short, window, config.ema_smoothing)?;
    let macd = compute_macd(&ema_short, &ema_long);
    let macd_signal = compute_macd_signal(&macd, config.periods_signal, config.ema_smoothing);
    let rsi = compute_rsi(&ordered, config.periods_rsi, window)?;

    Ok(IndicatorSeries {
        close_prices,
        ema_long,
        ema_short,
        macd,
        macd_signal,
        rsi,
    })
}
