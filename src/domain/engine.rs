//! Live engine: the two refresh schedules and the event loop that connects
//! market data, indicators, signals and positions.
//!
//! The loop owns an `mpsc` receiver of [`EngineEvent`]s. Candle ticks spawn
//! one task per instrument that fetches candles, computes indicators and
//! classifies signals, reporting back through the channel. Price ticks spawn
//! one trailing-stop task per instrument. Signal handling always runs in a
//! spawned task so a slow gateway never stalls the loop or other
//! instruments.
//!
//! Shutdown is a `broadcast` of `()`. The loop stops both schedules, gives
//! in-flight tasks a bounded time to finish, then aborts whatever is left.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::error::TraderError;
use crate::domain::indicator::{
    compute_indicators, IndicatorConfig, IndicatorSeries, IndicatorSnapshot,
};
use crate::domain::instrument::Instrument;
use crate::domain::position_manager::{PositionManager, Transition};
use crate::domain::signal::SignalEvent;
use crate::domain::signal_eval::{evaluate_signals, SignalThresholds, Signals};
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::presentation_port::PresentationPort;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub timeframe: String,
    pub candle_refresh: Duration,
    pub price_refresh: Duration,
    pub gateway_timeout: Duration,
    pub indicators: IndicatorConfig,
    pub thresholds: SignalThresholds,
}

impl EngineSettings {
    /// How long shutdown waits for in-flight tasks. A task makes at most
    /// two sequential collaborator calls, each bounded by the gateway timeout.
    pub fn drain_timeout(&self) -> Duration {
        self.gateway_timeout * 2 + Duration::from_millis(100)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Indicators {
        instrument: Instrument,
        series: IndicatorSeries,
    },
    Signals(Signals),
    Manual(SignalEvent),
}

/// Fetch history for one instrument and run it through the indicator engine
/// and the signal evaluator.
pub async fn evaluate_instrument(
    market_data: &dyn MarketDataPort,
    instrument: &Instrument,
    settings: &EngineSettings,
) -> Result<(IndicatorSeries, Signals), TraderError> {
    let limit = settings.indicators.required_history();
    let candles = time::timeout(
        settings.gateway_timeout,
        market_data.fetch_candles(instrument, &settings.timeframe, limit),
    )
    .await
    .map_err(|_| {
        TraderError::gateway(
            instrument,
            format!(
                "candle fetch timed out after {}ms",
                settings.gateway_timeout.as_millis()
            ),
        )
    })??;

    let series = compute_indicators(&candles, &settings.indicators)?;
    let signals = evaluate_signals(instrument, &series, &settings.thresholds)?;
    Ok((series, signals))
}

#[derive(Clone)]
struct EngineContext {
    settings: Arc<EngineSettings>,
    market_data: Arc<dyn MarketDataPort>,
    presentation: Arc<dyn PresentationPort>,
    positions: Arc<PositionManager>,
    events: mpsc::Sender<EngineEvent>,
}

pub struct LiveEngine {
    ctx: EngineContext,
    events_rx: mpsc::Receiver<EngineEvent>,
    shutdown: broadcast::Sender<()>,
}

impl LiveEngine {
    /// `shutdown` must be the sender the [`PositionManager`] was built with,
    /// so that transitions racing the shutdown are abandoned.
    pub fn new(
        settings: EngineSettings,
        market_data: Arc<dyn MarketDataPort>,
        presentation: Arc<dyn PresentationPort>,
        positions: Arc<PositionManager>,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        let (events, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        LiveEngine {
            ctx: EngineContext {
                settings: Arc::new(settings),
                market_data,
                presentation,
                positions,
                events,
            },
            events_rx,
            shutdown,
        }
    }

    /// Input for manual overrides and externally produced signals.
    pub fn event_sender(&self) -> mpsc::Sender<EngineEvent> {
        self.ctx.events.clone()
    }

    /// Run until a shutdown is broadcast. Returns the last indicator snapshot.
    pub async fn run(self) -> IndicatorSnapshot {
        let LiveEngine {
            ctx,
            mut events_rx,
            shutdown,
        } = self;
        let mut shutdown_rx = shutdown.subscribe();

        let mut candle_tick = time::interval(ctx.settings.candle_refresh);
        candle_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut price_tick = time::interval(ctx.settings.price_refresh);
        price_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut snapshot = IndicatorSnapshot::new();

        info!(
            instruments = ctx.positions.settings().precisions.len(),
            candle_refresh_secs = ctx.settings.candle_refresh.as_secs(),
            price_refresh_secs = ctx.settings.price_refresh.as_secs(),
            "engine started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = candle_tick.tick() => spawn_candle_refresh(&ctx, &mut tasks),
                _ = price_tick.tick() => spawn_price_refresh(&ctx, &mut tasks),
                Some(event) = events_rx.recv() => {
                    handle_event(&ctx, &mut snapshot, event, &mut tasks);
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "engine task failed");
                    }
                }
            }
        }

        info!(in_flight = tasks.len(), "engine shutting down");
        drain(&ctx, &mut events_rx, &mut tasks).await;
        info!("engine stopped");
        snapshot
    }
}

fn handle_event(
    ctx: &EngineContext,
    snapshot: &mut IndicatorSnapshot,
    event: EngineEvent,
    tasks: &mut JoinSet<()>,
) {
    match event {
        EngineEvent::Indicators { instrument, series } => {
            snapshot.insert(instrument, series);
            ctx.presentation.publish(snapshot);
        }
        EngineEvent::Signals(signals) => {
            let events = signals.into_events();
            if !events.is_empty() {
                let positions = ctx.positions.clone();
                tasks.spawn(async move {
                    for event in events {
                        apply_signal(&positions, &event).await;
                    }
                });
            }
        }
        EngineEvent::Manual(event) => {
            info!(instrument = %event.instrument, kind = %event.kind, "manual signal");
            let positions = ctx.positions.clone();
            tasks.spawn(async move {
                apply_signal(&positions, &event).await;
            });
        }
    }
}

fn spawn_candle_refresh(ctx: &EngineContext, tasks: &mut JoinSet<()>) {
    for instrument in ctx.positions.instruments() {
        let ctx = ctx.clone();
        let instrument = instrument.clone();
        tasks.spawn(async move {
            match evaluate_instrument(ctx.market_data.as_ref(), &instrument, &ctx.settings).await {
                Ok((series, signals)) => {
                    let indicators = EngineEvent::Indicators {
                        instrument: instrument.clone(),
                        series,
                    };
                    if let Err(e) = ctx.events.send(indicators).await {
                        debug!(instrument = %instrument, error = %e, "indicators dropped");
                    }
                    if !signals.is_empty() {
                        if let Err(e) = ctx.events.send(EngineEvent::Signals(signals)).await {
                            debug!(instrument = %instrument, error = %e, "signals dropped");
                        }
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(instrument = %instrument, error = %e, "candle refresh skipped");
                }
                Err(e) => {
                    error!(instrument = %instrument, error = %e, "candle refresh failed");
                }
            }
        });
    }
}

fn spawn_price_refresh(ctx: &EngineContext, tasks: &mut JoinSet<()>) {
    for instrument in ctx.positions.instruments() {
        let positions = ctx.positions.clone();
        let instrument = instrument.clone();
        tasks.spawn(async move {
            let outcome = positions.on_price_tick(&instrument).await;
            log_outcome(&instrument, "price tick", outcome);
        });
    }
}

async fn apply_signal(positions: &PositionManager, event: &SignalEvent) {
    let outcome = positions.handle_signal(event).await;
    log_outcome(&event.instrument, event.kind.as_str(), outcome);
}

fn log_outcome(instrument: &Instrument, cause: &str, outcome: Result<Transition, TraderError>) {
    match outcome {
        Ok(Transition::Opened(position)) => info!(
            instrument = %instrument,
            cause,
            entry_price = position.entry_price,
            stop_loss_price = position.stop_loss_price,
            "position opened"
        ),
        Ok(Transition::Closed(trade)) => info!(
            instrument = %instrument,
            cause,
            sell_type = %trade.sell_type,
            buy_price = trade.buy_price,
            sell_price = trade.sell_price,
            profit = trade.profit(),
            "position closed"
        ),
        Ok(Transition::StopRaised { from, to }) => {
            debug!(instrument = %instrument, from, to, "stop raised")
        }
        Ok(Transition::Held { exit_price }) => info!(
            instrument = %instrument,
            cause,
            exit_price,
            "sell ignored below entry"
        ),
        Ok(Transition::Unchanged) => {}
        Err(e @ TraderError::InvalidSignalForState { .. }) => {
            debug!(instrument = %instrument, cause, error = %e, "signal ignored")
        }
        Err(e @ TraderError::Cancelled { .. }) => {
            info!(instrument = %instrument, cause, error = %e, "transition cancelled")
        }
        Err(e) if e.is_transient() => {
            warn!(instrument = %instrument, cause, error = %e, "transition dropped")
        }
        Err(e) => error!(instrument = %instrument, cause, error = %e, "transition failed"),
    }
}

/// Wait for in-flight tasks, discarding any events they still produce.
async fn drain(
    ctx: &EngineContext,
    events_rx: &mut mpsc::Receiver<EngineEvent>,
    tasks: &mut JoinSet<()>,
) {
    let wait = async {
        while !tasks.is_empty() {
            tokio::select! {
                Some(joined) = tasks.join_next() => {
                    if let Err(e) = joined {
                        error!(error = %e, "engine task failed during shutdown");
                    }
                }
                Some(event) = events_rx.recv() => {
                    debug!(?event, "event discarded during shutdown");
                }
            }
        }
    };

    if time::timeout(ctx.settings.drain_timeout(), wait).await.is_err() {
        warn!(remaining = tasks.len(), "aborting tasks still running after shutdown");
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
    }
}
