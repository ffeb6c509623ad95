//! Per-instrument position state machine with a ratcheting trailing stop.
//!
//! Every configured instrument owns one fixed slot guarded by its own
//! `tokio::sync::Mutex`, so transitions for one instrument are serialized
//! while different instruments proceed in parallel. The slot map is built
//! once and never changes.
//!
//! A transition either completes or leaves the slot untouched: the gateway
//! quote is awaited before anything is written, and a failed or timed-out
//! call returns early. The only state written after a successful quote is
//! the slot itself plus, on exit, one ledger row.
//!
//! Once a shutdown has been broadcast the manager stays cancelled: every
//! later transition, including one that was queued on a slot lock, returns
//! `Cancelled` without committing.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};

use crate::domain::error::TraderError;
use crate::domain::instrument::Instrument;
use crate::domain::position::{Position, PositionState, TradeEvent};
use crate::domain::signal::{SignalEvent, SignalKind, Side};
use crate::ports::execution_port::{ExecutionGateway, Quote};
use crate::ports::ledger_port::TradeLedger;

#[derive(Debug, Clone, PartialEq)]
pub struct PositionSettings {
    pub timeframe: String,
    pub stop_loss_percent: f64,
    pub gateway_timeout: Duration,
    /// Decimal precision for every configured instrument. The keys are the
    /// full set of instruments the manager accepts.
    pub precisions: BTreeMap<Instrument, u32>,
}

/// Outcome of a signal or a price tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Opened(Position),
    Closed(TradeEvent),
    StopRaised { from: f64, to: f64 },
    /// Soft sell refused because it would realize a loss.
    Held { exit_price: f64 },
    Unchanged,
}

struct Slot {
    decimals: u32,
    position: Mutex<Option<Position>>,
}

pub struct PositionManager {
    slots: HashMap<Instrument, Slot>,
    settings: PositionSettings,
    gateway: Arc<dyn ExecutionGateway>,
    ledger: Arc<dyn TradeLedger>,
    shutdown_rx: StdMutex<broadcast::Receiver<()>>,
    cancelled: AtomicBool,
}

impl PositionManager {
    pub fn new(
        settings: PositionSettings,
        gateway: Arc<dyn ExecutionGateway>,
        ledger: Arc<dyn TradeLedger>,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        let slots = settings
            .precisions
            .iter()
            .map(|(instrument, &decimals)| {
                (
                    instrument.clone(),
                    Slot {
                        decimals,
                        position: Mutex::new(None),
                    },
                )
            })
            .collect();

        PositionManager {
            slots,
            settings,
            gateway,
            ledger,
            shutdown_rx: StdMutex::new(shutdown.subscribe()),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &PositionSettings {
        &self.settings
    }

    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.settings.precisions.keys()
    }

    fn slot(&self, instrument: &Instrument) -> Result<&Slot, TraderError> {
        self.slots
            .get(instrument)
            .ok_or_else(|| TraderError::UnknownInstrument {
                instrument: instrument.clone(),
            })
    }

    /// True once a shutdown has been broadcast. Sticky: the first observation
    /// is latched so that later callers see it without a receiver of their own.
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        let seen = match self.shutdown_rx.lock() {
            Ok(mut rx) => matches!(
                rx.try_recv(),
                Ok(()) | Err(broadcast::error::TryRecvError::Lagged(_))
            ),
            Err(_) => true,
        };
        if seen {
            self.cancelled.store(true, Ordering::SeqCst);
        }
        seen
    }

    fn ensure_running(&self, instrument: &Instrument) -> Result<(), TraderError> {
        if self.is_cancelled() {
            return Err(TraderError::Cancelled {
                instrument: instrument.clone(),
            });
        }
        Ok(())
    }

    /// Fetch a quote under the configured timeout. Cancellation is checked
    /// before the call and again once it returns, so nothing is committed
    /// after a shutdown.
    async fn quote(&self, instrument: &Instrument) -> Result<Quote, TraderError> {
        self.ensure_running(instrument)?;
        let timeout = self.settings.gateway_timeout;

        let result = tokio::time::timeout(timeout, self.gateway.quote(instrument)).await;
        self.ensure_running(instrument)?;

        match result {
            Ok(quote) => quote,
            Err(_) => Err(TraderError::gateway(
                instrument,
                format!("timed out after {}ms", timeout.as_millis()),
            )),
        }
    }

    /// Apply a buy or sell signal.
    ///
    /// Buys only act on a Flat instrument and sells only on an Open one; the
    /// mismatched case is reported as `InvalidSignalForState` without any
    /// gateway traffic.
    pub async fn handle_signal(&self, signal: &SignalEvent) -> Result<Transition, TraderError> {
        let instrument = &signal.instrument;
        let slot = self.slot(instrument)?;
        let mut guard = slot.position.lock().await;

        match (signal.kind.side(), guard.as_ref()) {
            (Side::Buy, Some(_)) => Err(TraderError::InvalidSignalForState {
                instrument: instrument.clone(),
                kind: signal.kind,
                state: PositionState::Open,
            }),
            (Side::Sell, None) => Err(TraderError::InvalidSignalForState {
                instrument: instrument.clone(),
                kind: signal.kind,
                state: PositionState::Flat,
            }),
            (Side::Buy, None) => {
                let quote = self.quote(instrument).await?;
                let position = Position::open(
                    instrument.clone(),
                    quote.price_for(Side::Buy),
                    self.settings.stop_loss_percent,
                    slot.decimals,
                    signal.kind,
                    Utc::now(),
                );
                *guard = Some(position.clone());
                Ok(Transition::Opened(position))
            }
            (Side::Sell, Some(position)) => {
                let quote = self.quote(instrument).await?;
                let exit_price = quote.price_for(Side::Sell);
                if !signal.kind.is_unconditional_exit() && exit_price < position.entry_price {
                    return Ok(Transition::Held { exit_price });
                }
                self.close(&mut guard, signal.kind, exit_price).await
            }
        }
    }

    /// Trailing-stop update for one instrument. Flat instruments are left
    /// alone without a gateway call.
    ///
    /// A price below the stop closes the position with `sell-stoploss` at
    /// that same price; otherwise the stop is ratcheted up if the price
    /// allows it.
    pub async fn on_price_tick(&self, instrument: &Instrument) -> Result<Transition, TraderError> {
        let slot = self.slot(instrument)?;
        let mut guard = slot.position.lock().await;

        let Some(position) = guard.as_ref() else {
            return Ok(Transition::Unchanged);
        };
        let quote = self.quote(instrument).await?;
        let price = quote.price_for(Side::Sell);

        if position.should_stop_out(price) {
            return self.close(&mut guard, SignalKind::SellStoploss, price).await;
        }

        match position.ratcheted_stop(price, self.settings.stop_loss_percent, slot.decimals) {
            Some(to) => {
                let from = position.stop_loss_price;
                if let Some(open) = guard.as_mut() {
                    open.stop_loss_price = to;
                }
                Ok(Transition::StopRaised { from, to })
            }
            None => Ok(Transition::Unchanged),
        }
    }

    /// Remove the position and append its trade. The slot is cleared even
    /// when the ledger write fails: the exit already happened. Ledger
    /// backends do blocking I/O, so the append runs on the blocking pool.
    async fn close(
        &self,
        slot: &mut Option<Position>,
        sell_type: SignalKind,
        exit_price: f64,
    ) -> Result<Transition, TraderError> {
        let Some(position) = slot.take() else {
            return Ok(Transition::Unchanged);
        };
        let trade = position.close(
            sell_type,
            exit_price,
            &self.settings.timeframe,
            self.settings.stop_loss_percent,
        );
        let ledger = self.ledger.clone();
        let row = trade.clone();
        tokio::task::spawn_blocking(move || ledger.append(&row))
            .await
            .map_err(TraderError::ledger)??;
        Ok(Transition::Closed(trade))
    }

    pub async fn position(&self, instrument: &Instrument) -> Result<Option<Position>, TraderError> {
        let slot = self.slot(instrument)?;
        Ok(slot.position.lock().await.clone())
    }

    pub async fn state(&self, instrument: &Instrument) -> Result<PositionState, TraderError> {
        Ok(match self.position(instrument).await? {
            Some(_) => PositionState::Open,
            None => PositionState::Flat,
        })
    }

    /// Snapshot of every Open position, ordered by instrument.
    pub async fn open_positions(&self) -> Vec<Position> {
        let mut open = Vec::new();
        for instrument in self.settings.precisions.keys() {
            if let Some(slot) = self.slots.get(instrument) {
                if let Some(position) = slot.position.lock().await.clone() {
                    open.push(position);
                }
            }
        }
        open
    }
}
