//! Market-data collaborator port.

use async_trait::async_trait;

use crate::domain::candle::Candle;
use crate::domain::error::TraderError;
use crate::domain::instrument::Instrument;

#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Up to `limit` most recent candles, newest-first. Any failure is reported
    /// as [`TraderError::GatewayUnavailable`].
    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, TraderError>;
}
