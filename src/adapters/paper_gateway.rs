//! Paper execution gateway: quotes around the latest close of the CSV
//! market data source.

use crate::adapters::csv_adapter::CsvMarketData;
use crate::domain::error::TraderError;
use crate::domain::instrument::Instrument;
use crate::ports::execution_port::{ExecutionGateway, Quote};
use crate::ports::market_data_port::MarketDataPort;
use async_trait::async_trait;
use std::sync::Arc;

pub struct PaperGateway {
    source: Arc<CsvMarketData>,
    timeframe: String,
    spread_pct: f64,
}

impl PaperGateway {
    pub fn new(source: Arc<CsvMarketData>, timeframe: &str, spread_pct: f64) -> Self {
        Self {
            source,
            timeframe: timeframe.to_string(),
            spread_pct,
        }
    }
}

#[async_trait]
impl ExecutionGateway for PaperGateway {
    async fn quote(&self, instrument: &Instrument) -> Result<Quote, TraderError> {
        let latest = self
            .source
            .fetch_candles(instrument, &self.timeframe, 1)
            .await?;
        let close = latest
            .first()
            .map(|c| c.close)
            .ok_or_else(|| TraderError::gateway(instrument, "no price data"))?;
        let half_spread = self.spread_pct / 2.0;
        Ok(Quote {
            bid: close * (1.0 - half_spread),
            ask: close * (1.0 + half_spread),
        })
    }
}
