//! Execution gateway port.

use async_trait::async_trait;

use crate::domain::error::TraderError;
use crate::domain::instrument::Instrument;
use crate::domain::signal::Side;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    /// Buys fill at the ask, sells at the bid.
    pub fn price_for(&self, side: Side) -> f64 {
        match side {
            Side::Buy => self.ask,
            Side::Sell => self.bid,
        }
    }
}

#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Current bid/ask. The caller applies its own timeout and never retries.
    async fn quote(&self, instrument: &Instrument) -> Result<Quote, TraderError>;
}
