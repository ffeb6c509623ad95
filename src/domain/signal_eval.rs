//! Rule-based signal evaluator.
//!
//! Classifies the last two bars of an [`IndicatorSeries`] into at most one buy
//! and at most one sell signal. Stateless: it never looks at positions.
//!
//! # Buy rules (only while price > EMA(short) > EMA(long)), first match wins
//!
//! 1. MACD crosses above its signal line and RSI is above the crossover level: `buy-macd`
//! 2. RSI crosses above the crossover level and MACD is above its signal line: `buy-rsi`
//! 3. The trend filter has just turned on, MACD above signal and RSI above level: `buy-ema`
//!
//! # Sell rules (independent of the trend filter), first match wins
//!
//! 1. MACD crosses below its signal line: `sell-macd`
//! 2. RSI crosses below the crossover level: `sell-rsi`
//!
//! Crosses are strict on both bars: equality on either side is not a cross.

use crate::domain::error::TraderError;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries};
use crate::domain::instrument::Instrument;
use crate::domain::signal::{SignalEvent, SignalKind};

pub const DEFAULT_RSI_CROSSOVER: f64 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SignalThresholds {
    pub rsi_crossover: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        SignalThresholds {
            rsi_crossover: DEFAULT_RSI_CROSSOVER,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signals {
    pub buy: Option<SignalEvent>,
    pub sell: Option<SignalEvent>,
}

impl Signals {
    pub fn is_empty(&self) -> bool {
        self.buy.is_none() && self.sell.is_none()
    }

    /// Buy first, then sell.
    pub fn into_events(self) -> Vec<SignalEvent> {
        self.buy.into_iter().chain(self.sell).collect()
    }
}

fn trend_up(p: &IndicatorPoint) -> bool {
    p.close > p.ema_short && p.ema_short > p.ema_long
}

fn macd_above(p: &IndicatorPoint) -> bool {
    p.macd > p.macd_signal
}

fn macd_below(p: &IndicatorPoint) -> bool {
    p.macd < p.macd_signal
}

fn rsi_above(p: &IndicatorPoint, level: f64) -> bool {
    p.rsi > level
}

fn rsi_below(p: &IndicatorPoint, level: f64) -> bool {
    p.rsi < level
}

pub fn evaluate_signals(
    instrument: &Instrument,
    series: &IndicatorSeries,
    thresholds: &SignalThresholds,
) -> Result<Signals, TraderError> {
    let len = series.len();
    let (prev, curr) = match (
        len.checked_sub(2).and_then(|i| series.point(i)),
        len.checked_sub(1).and_then(|i| series.point(i)),
    ) {
        (Some(prev), Some(curr)) => (prev, curr),
        _ => {
            return Err(TraderError::InsufficientHistory {
                bars: len,
                minimum: 2,
            })
        }
    };

    let level = thresholds.rsi_crossover;
    let macd_cross_up = macd_above(&curr) && macd_below(&prev);
    let macd_cross_down = macd_below(&curr) && macd_above(&prev);
    let rsi_cross_up = rsi_above(&curr, level) && rsi_below(&prev, level);
    let rsi_cross_down = rsi_below(&curr, level) && rsi_above(&prev, level);
    let trend_up_new = trend_up(&curr) && !trend_up(&prev);

    let buy = if !trend_up(&curr) {
        None
    } else if macd_cross_up && rsi_above(&curr, level) {
        Some(SignalKind::BuyMacd)
    } else if rsi_cross_up && macd_above(&curr) {
        Some(SignalKind::BuyRsi)
    } else if trend_up_new && macd_above(&curr) && rsi_above(&curr, level) {
        Some(SignalKind::BuyEma)
    } else {
        None
    };

    let sell = if macd_cross_down {
        Some(SignalKind::SellMacd)
    } else if rsi_cross_down {
        Some(SignalKind::SellRsi)
    } else {
        None
    };

    Ok(Signals {
        buy: buy.map(|kind| SignalEvent::new(instrument.clone(), kind)),
        sell: sell.map(|kind| SignalEvent::new(instrument.clone(), kind)),
    })
}
