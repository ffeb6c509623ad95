//! CSV file market data adapter.
//!
//! One file per instrument and timeframe, `{instrument}_{timeframe}.csv`,
//! with a header row `timestamp,open,high,low,close,volume`. Timestamps are
//! RFC 3339 or unix seconds. Rows may be in any order.

use crate::domain::candle::Candle;
use crate::domain::error::TraderError;
use crate::domain::instrument::Instrument;
use crate::ports::market_data_port::MarketDataPort;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::PathBuf;

pub struct CsvMarketData {
    base_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl CsvMarketData {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, instrument: &Instrument, timeframe: &str) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", instrument.as_str(), timeframe))
    }

    /// Every candle in the file, oldest-first.
    pub async fn load(
        &self,
        instrument: &Instrument,
        timeframe: &str,
    ) -> Result<Vec<Candle>, TraderError> {
        let path = self.csv_path(instrument, timeframe);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            TraderError::gateway(instrument, format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for (line, result) in rdr.deserialize::<CandleRow>().enumerate() {
            let row = result.map_err(|e| {
                TraderError::gateway(instrument, format!("CSV parse error: {}", e))
            })?;
            let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
                TraderError::gateway(
                    instrument,
                    format!("invalid timestamp '{}' on row {}", row.timestamp, line + 1),
                )
            })?;
            candles.push(Candle {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

#[async_trait]
impl MarketDataPort for CsvMarketData {
    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, TraderError> {
        let candles = self.load(instrument, timeframe).await?;
        Ok(candles.into_iter().rev().take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_test_data() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("btcusd_1m.csv"),
            "timestamp,open,high,low,close,volume\n\
             2024-01-15T12:02:00Z,101.0,103.0,100.5,102.0,7.5\n\
             2024-01-15T12:00:00Z,100.0,101.0,99.0,100.5,10.0\n\
             1705320060,100.5,101.5,100.0,101.0,8.0\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("ethusd_1m.csv"),
            "timestamp,open,high,low,close,volume\nyesterday,1,1,1,1,1\n",
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn fetch_candles_returns_newest_first() {
        let dir = setup_test_data();
        let adapter = CsvMarketData::new(dir.path().to_path_buf());

        let candles = adapter
            .fetch_candles(&Instrument::new("btcusd"), "1m", 10)
            .await
            .unwrap();
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].close, 102.0);
        assert_eq!(candles[1].close, 101.0);
        assert_eq!(candles[2].close, 100.5);
    }

    #[tokio::test]
    async fn fetch_candles_respects_limit() {
        let dir = setup_test_data();
        let adapter = CsvMarketData::new(dir.path().to_path_buf());

        let candles = adapter
            .fetch_candles(&Instrument::new("btcusd"), "1m", 2)
            .await
            .unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].close, 102.0);
    }

    #[tokio::test]
    async fn missing_file_is_gateway_unavailable() {
        let dir = setup_test_data();
        let adapter = CsvMarketData::new(dir.path().to_path_buf());

        let result = adapter
            .fetch_candles(&Instrument::new("ltcusd"), "1m", 10)
            .await;
        assert!(matches!(result, Err(TraderError::GatewayUnavailable { .. })));
    }

    #[tokio::test]
    async fn bad_timestamp_is_rejected() {
        let dir = setup_test_data();
        let adapter = CsvMarketData::new(dir.path().to_path_buf());

        let result = adapter
            .fetch_candles(&Instrument::new("ethusd"), "1m", 10)
            .await;
        assert!(matches!(result, Err(TraderError::GatewayUnavailable { .. })));
    }

    #[test]
    fn timestamp_formats() {
        assert_eq!(
            parse_timestamp("1705320000"),
            DateTime::from_timestamp(1_705_320_000, 0)
        );
        assert!(parse_timestamp("2024-01-15T12:00:00+00:00").is_some());
        assert!(parse_timestamp("15/01/2024").is_none());
    }
}
