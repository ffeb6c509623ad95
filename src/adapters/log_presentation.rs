//! Presentation adapter that writes the latest indicator values to the log.

use crate::domain::indicator::IndicatorSnapshot;
use crate::ports::presentation_port::PresentationPort;
use tracing::info;

#[derive(Debug, Default)]
pub struct LogPresentation;

impl PresentationPort for LogPresentation {
    fn publish(&self, snapshot: &IndicatorSnapshot) {
        for (instrument, series) in snapshot {
            if let Some(point) = series.latest() {
                info!(
                    instrument = %instrument,
                    close = point.close,
                    ema_short = point.ema_short,
                    ema_long = point.ema_long,
                    macd = point.macd,
                    macd_signal = point.macd_signal,
                    rsi = point.rsi,
                    "indicators"
                );
            }
        }
    }
}
