//! Port traits connecting the domain to the outside world.

pub mod config_port;
pub mod execution_port;
pub mod ledger_port;
pub mod market_data_port;
pub mod presentation_port;
