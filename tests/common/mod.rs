#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use trailtrader::domain::candle::Candle;
use trailtrader::domain::error::TraderError;
use trailtrader::domain::indicator::{IndicatorConfig, IndicatorSnapshot};
use trailtrader::domain::instrument::Instrument;
use trailtrader::domain::ledger::MemoryLedger;
use trailtrader::domain::position::TradeEvent;
use trailtrader::domain::position_manager::{PositionManager, PositionSettings};
use trailtrader::ports::execution_port::{ExecutionGateway, Quote};
use trailtrader::ports::ledger_port::TradeLedger;
use trailtrader::ports::market_data_port::MarketDataPort;
use trailtrader::ports::presentation_port::PresentationPort;

enum Step {
    Price(f64),
    Fail(String),
}

/// Execution gateway with a scripted sequence of quotes per instrument.
/// Each call consumes one step; once the script is exhausted the last price
/// repeats. Quotes have zero spread.
#[derive(Default)]
pub struct MockGateway {
    scripts: Mutex<HashMap<Instrument, VecDeque<Step>>>,
    last: Mutex<HashMap<Instrument, f64>>,
    delays: HashMap<Instrument, Duration>,
    calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices(self, instrument: &str, prices: &[f64]) -> Self {
        for &price in prices {
            self.push_price(instrument, price);
        }
        self
    }

    pub fn with_failure(self, instrument: &str, reason: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(Instrument::new(instrument))
            .or_default()
            .push_back(Step::Fail(reason.to_string()));
        self
    }

    pub fn with_delay(mut self, instrument: &str, delay: Duration) -> Self {
        self.delays.insert(Instrument::new(instrument), delay);
        self
    }

    pub fn push_price(&self, instrument: &str, price: f64) {
        self.scripts
            .lock()
            .unwrap()
            .entry(Instrument::new(instrument))
            .or_default()
            .push_back(Step::Price(price));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionGateway for MockGateway {
    async fn quote(&self, instrument: &Instrument) -> Result<Quote, TraderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(instrument) {
            tokio::time::sleep(*delay).await;
        }

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(instrument)
            .and_then(|script| script.pop_front());
        let price = match step {
            Some(Step::Price(price)) => price,
            Some(Step::Fail(reason)) => {
                return Err(TraderError::GatewayUnavailable {
                    instrument: instrument.clone(),
                    reason,
                })
            }
            None => match self.last.lock().unwrap().get(instrument) {
                Some(&price) => price,
                None => {
                    return Err(TraderError::GatewayUnavailable {
                        instrument: instrument.clone(),
                        reason: "no quote scripted".into(),
                    })
                }
            },
        };
        self.last.lock().unwrap().insert(instrument.clone(), price);
        Ok(Quote {
            bid: price,
            ask: price,
        })
    }
}

/// Market data with fixed newest-first candles per instrument.
#[derive(Default)]
pub struct MockMarketData {
    pub candles: HashMap<Instrument, Vec<Candle>>,
    pub errors: HashMap<Instrument, String>,
    pub requests: AtomicUsize,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candles(mut self, instrument: &str, candles: Vec<Candle>) -> Self {
        self.candles.insert(Instrument::new(instrument), candles);
        self
    }

    pub fn with_error(mut self, instrument: &str, reason: &str) -> Self {
        self.errors
            .insert(Instrument::new(instrument), reason.to_string());
        self
    }
}

#[async_trait]
impl MarketDataPort for MockMarketData {
    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        _timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, TraderError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.errors.get(instrument) {
            return Err(TraderError::GatewayUnavailable {
                instrument: instrument.clone(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .candles
            .get(instrument)
            .map(|c| c.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// Records every published snapshot.
#[derive(Default)]
pub struct RecordingPresentation {
    pub published: Mutex<Vec<IndicatorSnapshot>>,
}

impl RecordingPresentation {
    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<IndicatorSnapshot> {
        self.published.lock().unwrap().last().cloned()
    }
}

impl PresentationPort for RecordingPresentation {
    fn publish(&self, snapshot: &IndicatorSnapshot) {
        self.published.lock().unwrap().push(snapshot.clone());
    }
}

/// Ledger whose appends always fail.
pub struct FailingLedger;

impl TradeLedger for FailingLedger {
    fn append(&self, _event: &TradeEvent) -> Result<(), TraderError> {
        Err(TraderError::Ledger {
            reason: "disk full".into(),
        })
    }

    fn entries(&self) -> Result<Vec<TradeEvent>, TraderError> {
        Ok(Vec::new())
    }
}

/// Newest-first candles from oldest-first closes; each candle opens at the
/// previous close.
pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let mut candles: Vec<Candle> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: start + ChronoDuration::minutes(i as i64),
                open,
                high: open.max(close),
                low: open.min(close),
                close,
                volume: 1.0,
            }
        })
        .collect();
    candles.reverse();
    candles
}

pub fn flat_candles(count: usize, price: f64) -> Vec<Candle> {
    candles_from_closes(&vec![price; count])
}

/// Steady rise, a one-bar dip, then a breakout. With
/// [`small_indicator_config`] the last bar is a MACD cross up inside the
/// uptrend with RSI well above 50.
pub fn buy_macd_closes() -> Vec<f64> {
    let mut closes = vec![100.0];
    closes.extend((0..14).map(|i| 100.0 + i as f64));
    closes.extend([112.0, 113.0, 116.0]);
    closes
}

/// Accelerating rise followed by a sharp drop: the last bar is a MACD cross
/// down with price back under EMA(short).
pub fn sell_macd_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
    closes.extend([116.0, 120.0, 114.0]);
    closes
}

pub fn small_indicator_config() -> IndicatorConfig {
    IndicatorConfig {
        display_window: 10,
        periods_long: 8,
        periods_short: 4,
        periods_signal: 3,
        periods_rsi: 5,
        ema_smoothing: 2.0,
    }
}

pub fn position_settings(instruments: &[&str], timeout: Duration) -> PositionSettings {
    let precisions: BTreeMap<Instrument, u32> = instruments
        .iter()
        .map(|symbol| (Instrument::new(symbol), 2))
        .collect();
    PositionSettings {
        timeframe: "1m".into(),
        stop_loss_percent: 0.01,
        gateway_timeout: timeout,
        precisions,
    }
}

pub struct Harness {
    pub manager: Arc<PositionManager>,
    pub gateway: Arc<MockGateway>,
    pub ledger: Arc<MemoryLedger>,
    pub shutdown: broadcast::Sender<()>,
}

pub fn harness(instruments: &[&str], gateway: MockGateway, timeout: Duration) -> Harness {
    let gateway = Arc::new(gateway);
    let ledger = Arc::new(MemoryLedger::new());
    let (shutdown, _) = broadcast::channel(1);
    let manager = Arc::new(PositionManager::new(
        position_settings(instruments, timeout),
        gateway.clone(),
        ledger.clone(),
        shutdown.clone(),
    ));
    Harness {
        manager,
        gateway,
        ledger,
        shutdown,
    }
}
