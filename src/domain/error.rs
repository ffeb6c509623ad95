//! Domain error types.

use crate::domain::instrument::Instrument;
use crate::domain::position::PositionState;
use crate::domain::signal::SignalKind;

/// Top-level error type for trailtrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("insufficient candle history: have {bars} candles, need {minimum}")]
    InsufficientHistory { bars: usize, minimum: usize },

    #[error("gateway unavailable for {instrument}: {reason}")]
    GatewayUnavailable {
        instrument: Instrument,
        reason: String,
    },

    #[error("{kind} signal ignored for {instrument}: position is {state}")]
    InvalidSignalForState {
        instrument: Instrument,
        kind: SignalKind,
        state: PositionState,
    },

    #[error("instrument {instrument} is not configured")]
    UnknownInstrument { instrument: Instrument },

    #[error("transition for {instrument} abandoned: shutdown in progress")]
    Cancelled { instrument: Instrument },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("ledger error: {reason}")]
    Ledger { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub(crate) fn gateway(instrument: &Instrument, reason: impl Into<String>) -> Self {
        TraderError::GatewayUnavailable {
            instrument: instrument.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn ledger(reason: impl ToString) -> Self {
        TraderError::Ledger {
            reason: reason.to_string(),
        }
    }

    /// Errors the periodic schedules retry on their next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TraderError::InsufficientHistory { .. } | TraderError::GatewayUnavailable { .. }
        )
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. }
            | TraderError::UnknownInstrument { .. } => 2,
            TraderError::Ledger { .. } => 3,
            TraderError::InvalidSignalForState { .. } | TraderError::Cancelled { .. } => 4,
            TraderError::InsufficientHistory { .. } | TraderError::GatewayUnavailable { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
