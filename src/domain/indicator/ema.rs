//! Exponential Moving Average.
//!
//! k = smoothing/(1+n). The seed is the mean of the oldest n prices of the
//! lookback window (the most recent `display_window + n` prices), then
//! EMA[i] = P[i]*k + EMA[i-1]*(1-k) for each of the remaining `display_window`
//! prices. The seed itself is not part of the output.

use crate::domain::error::TraderError;

pub fn smoothing_factor(smoothing: f64, periods: usize) -> f64 {
    smoothing / (1.0 + periods as f64)
}

/// One EMA step.
pub fn ema_step(price: f64, previous: f64, k: f64) -> f64 {
    price * k + previous * (1.0 - k)
}

/// `closes` are oldest-first. Returns exactly `display_window` points, the last
/// one aligned with the most recent close.
pub fn compute_ema(
    closes: &[f64],
    periods: usize,
    display_window: usize,
    smoothing: f64,
) -> Result<Vec<f64>, TraderError> {
    if periods == 0 {
        return Err(TraderError::ConfigInvalid {
            section: "indicators".into(),
            key: "periods".into(),
            reason: "EMA periods must be at least 1".into(),
        });
    }

    let lookback = display_window + periods;
    if closes.len() < lookback {
        return Err(TraderError::InsufficientHistory {
            bars: closes.len(),
            minimum: lookback,
        });
    }

    let window = &closes[closes.len() - lookback..];
    let k = smoothing_factor(smoothing, periods);
    let mut ema = window[..periods].iter().sum::<f64>() / periods as f64;

    let mut values = Vec::with_capacity(display_window);
    for &price in &window[periods..] {
        ema = ema_step(price, ema, k);
        values.push(ema);
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn ema_output_length_is_display_window() {
        let closes: Vec<f64> = (1..=50).map(|i| i as f64).collect();
        let ema = compute_ema(&closes, 12, 30, 2.0).unwrap();
        assert_eq!(ema.len(), 30);
    }

    #[test]
    fn ema_seed_is_mean_of_oldest_lookback_prices() {
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let ema = compute_ema(&closes, 3, 4, 2.0).unwrap();

        // seed = (1+2+3)/3 = 2, k = 2/4 = 0.5
        assert_eq!(ema.len(), 4);
        assert_relative_eq!(ema[0], 3.0);
        assert_relative_eq!(ema[1], 4.0);
        assert_relative_eq!(ema[2], 5.0);
        assert_relative_eq!(ema[3], 6.0);
    }

    #[test]
    fn ema_ignores_prices_older_than_lookback() {
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let mut longer = vec![1_000.0, -50.0];
        longer.extend_from_slice(&closes);

        assert_eq!(
            compute_ema(&closes, 3, 4, 2.0).unwrap(),
            compute_ema(&longer, 3, 4, 2.0).unwrap()
        );
    }

    #[test]
    fn ema_custom_smoothing() {
        let closes = [10.0, 10.0, 20.0];
        let ema = compute_ema(&closes, 2, 1, 1.5).unwrap();
        let k = 1.5 / 3.0;
        assert_relative_eq!(ema[0], 20.0 * k + 10.0 * (1.0 - k));
    }

    #[test]
    fn ema_insufficient_history() {
        let closes = [1.0, 2.0, 3.0];
        match compute_ema(&closes, 3, 4, 2.0) {
            Err(TraderError::InsufficientHistory { bars, minimum }) => {
                assert_eq!(bars, 3);
                assert_eq!(minimum, 7);
            }
            other => panic!("expected InsufficientHistory, got {other:?}"),
        }
    }

    #[test]
    fn ema_zero_periods_rejected() {
        assert!(matches!(
            compute_ema(&[1.0, 2.0], 0, 1, 2.0),
            Err(TraderError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn smoothing_factor_matches_formula() {
        assert_relative_eq!(smoothing_factor(2.0, 10), 2.0 / 11.0);
    }

    proptest! {
        #[test]
        fn ema_of_constant_series_is_constant(
            price in 0.0001f64..100_000.0,
            periods in 1usize..30,
            window in 1usize..60,
        ) {
            let closes = vec![price; periods + window];
            let ema = compute_ema(&closes, periods, window, 2.0).unwrap();
            for value in ema {
                prop_assert!((value - price).abs() <= price * 1e-12);
            }
        }

        #[test]
        fn ema_converges_to_new_constant_level(
            start in 1.0f64..1_000.0,
            level in 1.0f64..1_000.0,
        ) {
            let mut closes = vec![start; 10];
            closes.extend(std::iter::repeat(level).take(400));
            let ema = compute_ema(&closes, 10, 400, 2.0).unwrap();
            let last = *ema.last().unwrap();
            prop_assert!((last - level).abs() < 1e-6 * level.max(start));
        }
    }
}
