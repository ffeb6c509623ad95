//! Typed application configuration built from a [`ConfigPort`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::config_validation::{configured_instruments, validate_trader_config};
use crate::domain::engine::EngineSettings;
use crate::domain::error::TraderError;
use crate::domain::indicator::{
    IndicatorConfig, DEFAULT_DISPLAY_WINDOW, DEFAULT_EMA_SMOOTHING, DEFAULT_PERIODS_LONG,
    DEFAULT_PERIODS_RSI, DEFAULT_PERIODS_SHORT, DEFAULT_PERIODS_SIGNAL,
};
use crate::domain::instrument::Instrument;
use crate::domain::position_manager::PositionSettings;
use crate::domain::signal_eval::{SignalThresholds, DEFAULT_RSI_CROSSOVER};
use crate::ports::config_port::ConfigPort;

pub const SECTION_TRADER: &str = "trader";
pub const SECTION_INDICATORS: &str = "indicators";
pub const SECTION_PRECISION: &str = "precision";
pub const SECTION_SCHEDULE: &str = "schedule";
pub const SECTION_LEDGER: &str = "ledger";
pub const SECTION_DATA: &str = "data";

pub const DEFAULT_INSTRUMENTS: [&str; 7] = [
    "btcusd", "ethusd", "ltcusd", "filusd", "linkusd", "oxtusd", "renusd",
];
pub const DEFAULT_TIMEFRAME: &str = "1m";
pub const DEFAULT_STOP_LOSS_PERCENT: f64 = 0.01;
pub const DEFAULT_PRECISION: u32 = 2;
pub const MAX_PRECISION: u32 = 12;

/// Built-in decimal precision for the instruments the application ships with.
pub fn default_precision(instrument: &Instrument) -> u32 {
    match instrument.as_str() {
        "filusd" => 4,
        "linkusd" | "oxtusd" | "renusd" => 5,
        _ => DEFAULT_PRECISION,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend {
    Csv,
    Sqlite,
}

impl LedgerBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "csv" => Some(LedgerBackend::Csv),
            "sqlite" => Some(LedgerBackend::Sqlite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub csv_dir: PathBuf,
    pub spread_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraderConfig {
    pub instruments: Vec<Instrument>,
    pub timeframe: String,
    pub stop_loss_percent: f64,
    pub indicators: IndicatorConfig,
    pub thresholds: SignalThresholds,
    pub precisions: BTreeMap<Instrument, u32>,
    pub candle_refresh: Duration,
    pub price_refresh: Duration,
    pub gateway_timeout: Duration,
    pub ledger: LedgerConfig,
    pub data: DataConfig,
}

impl TraderConfig {
    /// Validate and build. Absent keys take their defaults.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        validate_trader_config(config)?;

        let instruments = configured_instruments(config)?;
        let precisions = resolve_precisions(config, &instruments);

        let period = |key: &str, default: usize| get_usize(config, SECTION_INDICATORS, key, default);
        let indicators = IndicatorConfig {
            display_window: period("display_window", DEFAULT_DISPLAY_WINDOW),
            periods_long: period("periods_long", DEFAULT_PERIODS_LONG),
            periods_short: period("periods_short", DEFAULT_PERIODS_SHORT),
            periods_signal: period("periods_signal", DEFAULT_PERIODS_SIGNAL),
            periods_rsi: period("periods_rsi", DEFAULT_PERIODS_RSI),
            ema_smoothing: config.get_double(
                SECTION_INDICATORS,
                "ema_smoothing",
                DEFAULT_EMA_SMOOTHING,
            ),
        };
        let schedule = |key: &str, default: u64| get_u64(config, SECTION_SCHEDULE, key, default);

        let backend = config
            .get_string(SECTION_LEDGER, "backend")
            .and_then(|b| LedgerBackend::parse(&b))
            .unwrap_or(LedgerBackend::Csv);
        let default_ledger_path = match backend {
            LedgerBackend::Csv => "trades.csv",
            LedgerBackend::Sqlite => "trades.db",
        };

        Ok(TraderConfig {
            instruments,
            timeframe: config
                .get_string(SECTION_TRADER, "timeframe")
                .map(|t| t.trim().to_string())
                .unwrap_or_else(|| DEFAULT_TIMEFRAME.to_string()),
            stop_loss_percent: config.get_double(
                SECTION_TRADER,
                "stop_loss_percent",
                DEFAULT_STOP_LOSS_PERCENT,
            ),
            indicators,
            thresholds: SignalThresholds {
                rsi_crossover: config.get_double(
                    SECTION_INDICATORS,
                    "rsi_crossover",
                    DEFAULT_RSI_CROSSOVER,
                ),
            },
            precisions,
            candle_refresh: Duration::from_secs(schedule("candle_refresh_secs", 60)),
            price_refresh: Duration::from_secs(schedule("price_refresh_secs", 30)),
            gateway_timeout: Duration::from_millis(schedule("gateway_timeout_ms", 5000)),
            ledger: LedgerConfig {
                backend,
                path: PathBuf::from(
                    config
                        .get_string(SECTION_LEDGER, "path")
                        .unwrap_or_else(|| default_ledger_path.to_string()),
                ),
            },
            data: DataConfig {
                csv_dir: PathBuf::from(
                    config
                        .get_string(SECTION_DATA, "csv_dir")
                        .unwrap_or_else(|| "data".to_string()),
                ),
                spread_pct: config.get_double(SECTION_DATA, "spread_pct", 0.0),
            },
        })
    }

    pub fn position_settings(&self) -> PositionSettings {
        PositionSettings {
            timeframe: self.timeframe.clone(),
            stop_loss_percent: self.stop_loss_percent,
            gateway_timeout: self.gateway_timeout,
            precisions: self.precisions.clone(),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            timeframe: self.timeframe.clone(),
            candle_refresh: self.candle_refresh,
            price_refresh: self.price_refresh,
            gateway_timeout: self.gateway_timeout,
            indicators: self.indicators.clone(),
            thresholds: self.thresholds.clone(),
        }
    }
}

fn get_usize(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    usize::try_from(config.get_int(section, key, default as i64)).unwrap_or(default)
}

fn get_u64(config: &dyn ConfigPort, section: &str, key: &str, default: u64) -> u64 {
    u64::try_from(config.get_int(section, key, default as i64)).unwrap_or(default)
}

/// One entry per configured instrument: the `[precision]` value when given,
/// otherwise the built-in default.
fn resolve_precisions(
    config: &dyn ConfigPort,
    instruments: &[Instrument],
) -> BTreeMap<Instrument, u32> {
    let overrides: BTreeMap<Instrument, u32> = config
        .section_entries(SECTION_PRECISION)
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .trim()
                .parse::<u32>()
                .ok()
                .map(|decimals| (Instrument::new(&key), decimals))
        })
        .collect();

    instruments
        .iter()
        .map(|instrument| {
            let decimals = overrides
                .get(instrument)
                .copied()
                .unwrap_or_else(|| default_precision(instrument));
            (instrument.clone(), decimals)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn build(content: &str) -> Result<TraderConfig, TraderError> {
        TraderConfig::from_config(&FileConfigAdapter::from_string(content).unwrap())
    }

    #[test]
    fn defaults_match_reference_application() {
        let config = build("").unwrap();
        assert_eq!(config.instruments.len(), 7);
        assert_eq!(config.timeframe, "1m");
        assert!((config.stop_loss_percent - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.indicators, IndicatorConfig::default());
        assert_eq!(config.thresholds, SignalThresholds::default());
        assert_eq!(config.candle_refresh, Duration::from_secs(60));
        assert_eq!(config.price_refresh, Duration::from_secs(30));
        assert_eq!(config.gateway_timeout, Duration::from_millis(5000));
        assert_eq!(config.ledger.backend, LedgerBackend::Csv);
        assert_eq!(config.ledger.path, PathBuf::from("trades.csv"));
    }

    #[test]
    fn default_precision_table() {
        let config = build("").unwrap();
        assert_eq!(config.precisions[&Instrument::new("btcusd")], 2);
        assert_eq!(config.precisions[&Instrument::new("filusd")], 4);
        assert_eq!(config.precisions[&Instrument::new("renusd")], 5);
    }

    #[test]
    fn precision_override_and_fallback() {
        let config = build(
            "[trader]\ninstruments = btcusd,dogeusd\n[precision]\nbtcusd = 3\nethusd = 6\n",
        )
        .unwrap();
        assert_eq!(config.precisions.len(), 2);
        assert_eq!(config.precisions[&Instrument::new("btcusd")], 3);
        assert_eq!(config.precisions[&Instrument::new("dogeusd")], DEFAULT_PRECISION);
    }

    #[test]
    fn reads_custom_values() {
        let config = build(
            r#"
[trader]
instruments = ETHUSD
timeframe = 5m
stop_loss_percent = 0.02

[indicators]
display_window = 30
periods_long = 20
periods_short = 10
periods_signal = 5
periods_rsi = 14
ema_smoothing = 3
rsi_crossover = 45

[schedule]
candle_refresh_secs = 300
price_refresh_secs = 10
gateway_timeout_ms = 750

[ledger]
backend = sqlite
"#,
        );
        if !cfg!(feature = "sqlite") {
            assert!(config.is_err());
            return;
        }
        let config = config.unwrap();
        assert_eq!(config.instruments, vec![Instrument::new("ethusd")]);
        assert_eq!(config.timeframe, "5m");
        assert_eq!(config.indicators.display_window, 30);
        assert_eq!(config.indicators.periods_rsi, 14);
        assert!((config.indicators.ema_smoothing - 3.0).abs() < f64::EPSILON);
        assert!((config.thresholds.rsi_crossover - 45.0).abs() < f64::EPSILON);
        assert_eq!(config.price_refresh, Duration::from_secs(10));
        assert_eq!(config.gateway_timeout, Duration::from_millis(750));
        assert_eq!(config.ledger.backend, LedgerBackend::Sqlite);
        assert_eq!(config.ledger.path, PathBuf::from("trades.db"));
    }

    #[test]
    fn settings_views_share_values() {
        let config = build("[trader]\ninstruments = btcusd\n").unwrap();
        let position = config.position_settings();
        let engine = config.engine_settings();
        assert_eq!(position.precisions.len(), 1);
        assert_eq!(position.gateway_timeout, engine.gateway_timeout);
        assert_eq!(engine.timeframe, "1m");
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(matches!(
            build("[trader]\nstop_loss_percent = 2\n"),
            Err(TraderError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn ledger_backend_parse() {
        assert_eq!(LedgerBackend::parse("CSV"), Some(LedgerBackend::Csv));
        assert_eq!(LedgerBackend::parse(" sqlite "), Some(LedgerBackend::Sqlite));
        assert_eq!(LedgerBackend::parse("postgres"), None);
    }
}
