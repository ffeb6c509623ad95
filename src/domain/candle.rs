//! OHLCV candle representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// close - open
    pub fn change(&self) -> f64 {
        self.close - self.open
    }
}

/// Market feeds deliver candles newest-first; indicator maths runs oldest-first.
pub fn oldest_first(newest_first: &[Candle]) -> Vec<Candle> {
    newest_first.iter().rev().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(minute: u32, open: f64, close: f64) -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 12, minute, 0).unwrap(),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn change_positive_for_green_candle() {
        assert!((candle(0, 100.0, 104.5).change() - 4.5).abs() < f64::EPSILON);
    }

    #[test]
    fn change_negative_for_red_candle() {
        assert!((candle(0, 100.0, 97.0).change() + 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn oldest_first_reverses_feed_order() {
        let feed = vec![candle(2, 3.0, 3.0), candle(1, 2.0, 2.0), candle(0, 1.0, 1.0)];
        let ordered = oldest_first(&feed);
        let closes: Vec<f64> = ordered.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
        assert!(ordered[0].timestamp < ordered[2].timestamp);
    }

    #[test]
    fn oldest_first_empty() {
        assert!(oldest_first(&[]).is_empty());
    }
}
