//! SQLite trade ledger. Insert-only `trades` table behind an r2d2 pool.

use crate::domain::error::TraderError;
use crate::domain::instrument::Instrument;
use crate::domain::position::TradeEvent;
use crate::domain::signal::SignalKind;
use crate::ports::ledger_port::TradeLedger;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

pub struct SqliteLedgerAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteLedgerAdapter {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TraderError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e: r2d2::Error| TraderError::ledger(e))?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, TraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| TraderError::ledger(e))?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TraderError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| TraderError::ledger(e))
    }

    pub fn initialize_schema(&self) -> Result<(), TraderError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS trades (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    instrument TEXT NOT NULL,
                    buy_type TEXT NOT NULL,
                    sell_type TEXT NOT NULL,
                    buy_price REAL NOT NULL,
                    sell_price REAL NOT NULL,
                    timeframe TEXT NOT NULL,
                    stop_loss_percent REAL NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_trades_instrument ON trades(instrument);",
            )
            .map_err(|e: rusqlite::Error| TraderError::ledger(e))?;
        Ok(())
    }
}

fn parse_kind(idx: usize, value: String) -> rusqlite::Result<SignalKind> {
    value.parse::<SignalKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

impl TradeLedger for SqliteLedgerAdapter {
    fn append(&self, event: &TradeEvent) -> Result<(), TraderError> {
        self.conn()?
            .execute(
                "INSERT INTO trades
                    (instrument, buy_type, sell_type, buy_price, sell_price, timeframe, stop_loss_percent)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.instrument.as_str(),
                    event.buy_type.as_str(),
                    event.sell_type.as_str(),
                    event.buy_price,
                    event.sell_price,
                    event.timeframe,
                    event.stop_loss_percent
                ],
            )
            .map_err(|e: rusqlite::Error| TraderError::ledger(e))?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<TradeEvent>, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT instrument, buy_type, sell_type, buy_price, sell_price, timeframe, stop_loss_percent
                 FROM trades
                 ORDER BY id ASC",
            )
            .map_err(|e: rusqlite::Error| TraderError::ledger(e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(TradeEvent {
                    instrument: Instrument::new(&row.get::<_, String>(0)?),
                    buy_type: parse_kind(1, row.get(1)?)?,
                    sell_type: parse_kind(2, row.get(2)?)?,
                    buy_price: row.get(3)?,
                    sell_price: row.get(4)?,
                    timeframe: row.get(5)?,
                    stop_loss_percent: row.get(6)?,
                })
            })
            .map_err(|e: rusqlite::Error| TraderError::ledger(e))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e: rusqlite::Error| TraderError::ledger(e))
    }
}
