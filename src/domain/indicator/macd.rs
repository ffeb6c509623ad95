//! MACD (Moving Average Convergence Divergence) and its signal line.
//!
//! MACD Line = EMA(short) - EMA(long), pointwise.
//! Signal Line = EMA(periods_signal) of the MACD line, seeded with the oldest
//! MACD value. Seeding consumes one point, so the result is front-padded with
//! its first computed value back to the input length.

use crate::domain::indicator::ema::{ema_step, smoothing_factor};

pub fn compute_macd(ema_short: &[f64], ema_long: &[f64]) -> Vec<f64> {
    ema_short
        .iter()
        .zip(ema_long)
        .map(|(short, long)| short - long)
        .collect()
}

pub fn compute_macd_signal(macd: &[f64], periods_signal: usize, smoothing: f64) -> Vec<f64> {
    if macd.len() < 2 {
        return macd.to_vec();
    }

    let k = smoothing_factor(smoothing, periods_signal);
    let mut signal = macd[0];
    let mut computed = Vec::with_capacity(macd.len() - 1);
    for &value in &macd[1..] {
        signal = ema_step(value, signal, k);
        computed.push(signal);
    }

    let mut values = Vec::with_capacity(macd.len());
    values.push(computed[0]);
    values.extend(computed);
    values
}
