//! Configuration validation.
//!
//! Every field is checked before the engine or any one-shot command starts.
//! Missing keys fall back to their defaults; present but out-of-range values
//! are rejected.

use crate::domain::error::TraderError;
use crate::domain::instrument::{parse_instruments, Instrument};
use crate::domain::trader_config::{
    LedgerBackend, DEFAULT_INSTRUMENTS, MAX_PRECISION, SECTION_DATA, SECTION_INDICATORS,
    SECTION_LEDGER, SECTION_PRECISION, SECTION_SCHEDULE, SECTION_TRADER,
};
use crate::ports::config_port::ConfigPort;

pub fn validate_trader_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_numbers(config)?;
    validate_instruments(config)?;
    validate_timeframe(config)?;
    validate_stop_loss(config)?;
    validate_indicator_periods(config)?;
    validate_smoothing(config)?;
    validate_rsi_crossover(config)?;
    validate_precision(config)?;
    validate_schedule(config)?;
    validate_ledger(config)?;
    validate_spread(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

const INTEGER_KEYS: [(&str, &str); 8] = [
    (SECTION_INDICATORS, "display_window"),
    (SECTION_INDICATORS, "periods_long"),
    (SECTION_INDICATORS, "periods_short"),
    (SECTION_INDICATORS, "periods_signal"),
    (SECTION_INDICATORS, "periods_rsi"),
    (SECTION_SCHEDULE, "candle_refresh_secs"),
    (SECTION_SCHEDULE, "price_refresh_secs"),
    (SECTION_SCHEDULE, "gateway_timeout_ms"),
];

const NUMBER_KEYS: [(&str, &str); 4] = [
    (SECTION_TRADER, "stop_loss_percent"),
    (SECTION_INDICATORS, "ema_smoothing"),
    (SECTION_INDICATORS, "rsi_crossover"),
    (SECTION_DATA, "spread_pct"),
];

/// A numeric key that is present must parse. Lookups fall back to the
/// default for unparsable text, which would hide typos like `1%`.
fn validate_numbers(config: &dyn ConfigPort) -> Result<(), TraderError> {
    for (section, key) in INTEGER_KEYS {
        if let Some(raw) = config.get_string(section, key) {
            if raw.trim().parse::<i64>().is_err() {
                return Err(invalid(section, key, format!("'{raw}' is not an integer")));
            }
        }
    }
    for (section, key) in NUMBER_KEYS {
        if let Some(raw) = config.get_string(section, key) {
            if !raw.trim().parse::<f64>().is_ok_and(f64::is_finite) {
                return Err(invalid(section, key, format!("'{raw}' is not a number")));
            }
        }
    }
    Ok(())
}

/// Configured instrument list, or the built-in default list when the key is
/// absent.
pub(crate) fn configured_instruments(
    config: &dyn ConfigPort,
) -> Result<Vec<Instrument>, TraderError> {
    let raw = config
        .get_string(SECTION_TRADER, "instruments")
        .unwrap_or_else(|| DEFAULT_INSTRUMENTS.join(","));
    parse_instruments(&raw).map_err(|e| invalid(SECTION_TRADER, "instruments", e.to_string()))
}

fn validate_instruments(config: &dyn ConfigPort) -> Result<(), TraderError> {
    configured_instruments(config).map(|_| ())
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<(), TraderError> {
    match config.get_string(SECTION_TRADER, "timeframe") {
        Some(s) if s.trim().is_empty() => Err(invalid(
            SECTION_TRADER,
            "timeframe",
            "timeframe must not be empty",
        )),
        _ => Ok(()),
    }
}

fn validate_stop_loss(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = config.get_double(SECTION_TRADER, "stop_loss_percent", 0.01);
    if !(value > 0.0 && value < 1.0) {
        return Err(invalid(
            SECTION_TRADER,
            "stop_loss_percent",
            "stop_loss_percent must be between 0 and 1 (exclusive)",
        ));
    }
    Ok(())
}

fn validate_indicator_periods(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let display_window = config.get_int(SECTION_INDICATORS, "display_window", 60);
    if display_window < 2 {
        return Err(invalid(
            SECTION_INDICATORS,
            "display_window",
            "display_window must be at least 2",
        ));
    }

    for key in ["periods_long", "periods_short", "periods_signal", "periods_rsi"] {
        if config.get_int(SECTION_INDICATORS, key, 1) < 1 {
            return Err(invalid(
                SECTION_INDICATORS,
                key,
                format!("{key} must be positive"),
            ));
        }
    }
    Ok(())
}

fn validate_smoothing(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = config.get_double(SECTION_INDICATORS, "ema_smoothing", 2.0);
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(
            SECTION_INDICATORS,
            "ema_smoothing",
            "ema_smoothing must be positive",
        ));
    }
    Ok(())
}

fn validate_rsi_crossover(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = config.get_double(SECTION_INDICATORS, "rsi_crossover", 50.0);
    if !(0.0..=100.0).contains(&value) {
        return Err(invalid(
            SECTION_INDICATORS,
            "rsi_crossover",
            "rsi_crossover must be between 0 and 100",
        ));
    }
    Ok(())
}

fn validate_precision(config: &dyn ConfigPort) -> Result<(), TraderError> {
    for (key, value) in config.section_entries(SECTION_PRECISION) {
        match value.trim().parse::<u32>() {
            Ok(decimals) if decimals <= MAX_PRECISION => {}
            _ => {
                return Err(invalid(
                    SECTION_PRECISION,
                    &key,
                    format!("precision must be an integer between 0 and {MAX_PRECISION}"),
                ))
            }
        }
    }
    Ok(())
}

fn validate_schedule(config: &dyn ConfigPort) -> Result<(), TraderError> {
    for (key, default) in [
        ("candle_refresh_secs", 60),
        ("price_refresh_secs", 30),
        ("gateway_timeout_ms", 5000),
    ] {
        if config.get_int(SECTION_SCHEDULE, key, default) <= 0 {
            return Err(invalid(
                SECTION_SCHEDULE,
                key,
                format!("{key} must be positive"),
            ));
        }
    }
    Ok(())
}

fn validate_ledger(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let backend = config
        .get_string(SECTION_LEDGER, "backend")
        .unwrap_or_else(|| "csv".to_string());
    match LedgerBackend::parse(&backend) {
        Some(LedgerBackend::Sqlite) if !cfg!(feature = "sqlite") => Err(invalid(
            SECTION_LEDGER,
            "backend",
            "built without sqlite support",
        )),
        Some(_) => Ok(()),
        None => Err(invalid(
            SECTION_LEDGER,
            "backend",
            format!("unknown ledger backend '{backend}', expected csv or sqlite"),
        )),
    }
}

fn validate_spread(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = config.get_double(SECTION_DATA, "spread_pct", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            SECTION_DATA,
            "spread_pct",
            "spread_pct must be in [0, 1)",
        ));
    }
    Ok(())
}
