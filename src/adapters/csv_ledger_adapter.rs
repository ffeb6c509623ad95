//! Append-only CSV trade ledger.
//!
//! Columns: `instrument,buy_type,sell_type,buy_price,sell_price,timeframe,stop_loss_percent`.
//! The header is written when the file is created; later appends only add
//! rows.

use crate::domain::error::TraderError;
use crate::domain::position::TradeEvent;
use crate::ports::ledger_port::TradeLedger;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct CsvLedgerAdapter {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvLedgerAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TradeLedger for CsvLedgerAdapter {
    fn append(&self, event: &TradeEvent) -> Result<(), TraderError> {
        let _guard = self.write_lock.lock().map_err(TraderError::ledger)?;

        let needs_header = fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                TraderError::ledger(format!("failed to open {}: {}", self.path.display(), e))
            })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(event).map_err(TraderError::ledger)?;
        writer.flush().map_err(TraderError::ledger)?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<TradeEvent>, TraderError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path).map_err(TraderError::ledger)?;
        reader
            .deserialize()
            .map(|row| row.map_err(TraderError::ledger))
            .collect()
    }
}
