//! Core domain types and logic.

pub mod candle;
pub mod config_validation;
pub mod engine;
pub mod error;
pub mod indicator;
pub mod instrument;
pub mod ledger;
pub mod position;
pub mod position_manager;
pub mod signal;
pub mod signal_eval;
pub mod trader_config;
