//! In-memory trade ledger and ledger reporting.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::domain::error::TraderError;
use crate::domain::instrument::Instrument;
use crate::domain::position::TradeEvent;
use crate::ports::ledger_port::TradeLedger;

/// Append-only ledger kept in memory. Used by tests and by `evaluate`, which
/// never persists.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    rows: Mutex<Vec<TradeEvent>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TradeLedger for MemoryLedger {
    fn append(&self, event: &TradeEvent) -> Result<(), TraderError> {
        let mut rows = self.rows.lock().map_err(TraderError::ledger)?;
        rows.push(event.clone());
        Ok(())
    }

    fn entries(&self) -> Result<Vec<TradeEvent>, TraderError> {
        let rows = self.rows.lock().map_err(TraderError::ledger)?;
        Ok(rows.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSummary {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub total_profit: f64,
    pub profit_by_instrument: BTreeMap<Instrument, f64>,
}

impl LedgerSummary {
    /// A trade with zero profit counts as neither a win nor a loss.
    pub fn from_events(events: &[TradeEvent]) -> Self {
        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut total_profit = 0.0_f64;
        let mut profit_by_instrument: BTreeMap<Instrument, f64> = BTreeMap::new();

        for event in events {
            let profit = event.profit();
            if profit > 0.0 {
                wins += 1;
            } else if profit < 0.0 {
                losses += 1;
            }
            total_profit += profit;
            *profit_by_instrument
                .entry(event.instrument.clone())
                .or_insert(0.0) += profit;
        }

        LedgerSummary {
            trades: events.len(),
            wins,
            losses,
            total_profit,
            profit_by_instrument,
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.trades as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::SignalKind;
    use approx::assert_relative_eq;

    fn trade(instrument: &str, buy: f64, sell: f64) -> TradeEvent {
        TradeEvent {
            instrument: Instrument::new(instrument),
            buy_type: SignalKind::BuyMacd,
            sell_type: SignalKind::SellStoploss,
            buy_price: buy,
            sell_price: sell,
            timeframe: "1m".into(),
            stop_loss_percent: 0.01,
        }
    }

    #[test]
    fn memory_ledger_appends_in_order() {
        let ledger = MemoryLedger::new();
        assert!(ledger.is_empty());
        ledger.append(&trade("btcusd", 100.0, 98.0)).unwrap();
        ledger.append(&trade("ethusd", 50.0, 55.0)).unwrap();

        let rows = ledger.entries().unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(rows[0].instrument, Instrument::new("btcusd"));
        assert_eq!(rows[1].instrument, Instrument::new("ethusd"));
    }

    #[test]
    fn summary_of_empty_ledger() {
        let summary = LedgerSummary::from_events(&[]);
        assert_eq!(summary.trades, 0);
        assert_eq!(summary.wins, 0);
        assert_eq!(summary.losses, 0);
        assert_relative_eq!(summary.total_profit, 0.0);
        assert_relative_eq!(summary.win_rate(), 0.0);
        assert!(summary.profit_by_instrument.is_empty());
    }

    #[test]
    fn summary_counts_wins_losses_and_profit() {
        let events = vec![
            trade("btcusd", 100.0, 98.0),
            trade("btcusd", 100.0, 110.0),
            trade("ethusd", 50.0, 55.0),
            trade("ethusd", 50.0, 50.0),
        ];
        let summary = LedgerSummary::from_events(&events);

        assert_eq!(summary.trades, 4);
        assert_eq!(summary.wins, 2);
        assert_eq!(summary.losses, 1);
        assert_relative_eq!(summary.total_profit, 13.0);
        assert_relative_eq!(summary.win_rate(), 0.5);
        assert_relative_eq!(
            summary.profit_by_instrument[&Instrument::new("btcusd")],
            8.0
        );
        assert_relative_eq!(
            summary.profit_by_instrument[&Instrument::new("ethusd")],
            5.0
        );
    }
}
