//! RSI (Relative Strength Index) over intra-candle changes.
//!
//! For each of the `display_window` most recent candles, take the trailing
//! `periods` candles ending at (and including) it. A candle with
//! close > open contributes close-open to gains, close < open contributes
//! open-close to losses. Both sums are divided by `periods`.
//!
//! RSI = 100 - 100/(1 + avg_gain/avg_loss). A window without losses is the
//! limit of that formula, RSI = 100; nothing ever divides by zero.

use crate::domain::candle::Candle;
use crate::domain::error::TraderError;

pub fn compute_rsi(
    candles: &[Candle],
    periods: usize,
    display_window: usize,
) -> Result<Vec<f64>, TraderError> {
    if periods == 0 {
        return Err(TraderError::ConfigInvalid {
            section: "indicators".into(),
            key: "periods_rsi".into(),
            reason: "RSI periods must be at least 1".into(),
        });
    }

    let minimum = display_window + periods - 1;
    if candles.len() < minimum {
        return Err(TraderError::InsufficientHistory {
            bars: candles.len(),
            minimum,
        });
    }

    let first = candles.len() - display_window;
    let values = (first..candles.len())
        .map(|end| rsi_of_window(&candles[end + 1 - periods..=end], periods))
        .collect();

    Ok(values)
}

fn rsi_of_window(window: &[Candle], periods: usize) -> f64 {
    let mut gains = 0.0;
    let mut losses = 0.0;
    for candle in window {
        let change = candle.change();
        if change > 0.0 {
            gains += change;
        } else if change < 0.0 {
            losses -= change;
        }
    }

    let avg_gain = gains / periods as f64;
    let avg_loss = losses / periods as f64;
    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
