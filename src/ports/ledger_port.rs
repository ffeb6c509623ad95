//! Trade ledger port.

use crate::domain::error::TraderError;
use crate::domain::position::TradeEvent;

/// Append-only store of closed trades. `append` is the only mutator;
/// existing rows are never edited or removed.
///
/// Implementations may block on file or database I/O; async callers run
/// them through `tokio::task::spawn_blocking`.
pub trait TradeLedger: Send + Sync {
    fn append(&self, event: &TradeEvent) -> Result<(), TraderError>;

    /// All rows in append order, for reporting.
    fn entries(&self) -> Result<Vec<TradeEvent>, TraderError>;
}
