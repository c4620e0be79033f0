//! Embedded durable document store over SQLite.
//!
//! Logical collections are tables whose names carry the instrument id
//! suffix: `orders_<id>` (every order ever submitted, keyed by order id),
//! `live_orders_<id>` (currently resting orders), `trades_<id>`
//! (append-only), plus the shared `instruments` and `counters` tables.
//! Tables are created on demand, so a write for an instrument that was never
//! explicitly registered still lands.

use crate::orders::{Order, OrderType, Side, Trade};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::trace;
use uuid::Uuid;

/// Name of the persisted counter backing order-id allocation.
pub const ORDER_ID_COUNTER: &str = "order_id";

/// Name of the persisted counter observers poll to detect change.
pub const ACTION_COUNT_COUNTER: &str = "action_count";

/// Errors raised by the durable store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The underlying SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Another thread panicked while holding the connection.
    #[error("store connection mutex poisoned")]
    MutexPoisoned,
}

/// A single-connection SQLite store.
///
/// The connection is guarded by a mutex: the durable writer's consumer is
/// the only steady-state writer, so the lock is uncontended except for the
/// occasional rebuild-side or observer read.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the database cannot be opened or the
    /// shared schema cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a transient in-memory store. Mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS counters (
                name TEXT PRIMARY KEY,
                seq INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS instruments (
                instrument_id INTEGER PRIMARY KEY,
                created_at INTEGER NOT NULL
            );",
        )
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::MutexPoisoned)
    }

    /// Creates the per-instrument tables if any are missing.
    fn ensure_instrument_tables(
        conn: &Connection,
        instrument_id: u32,
    ) -> Result<(), rusqlite::Error> {
        for table in ["orders", "live_orders"] {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {table}_{instrument_id} (
                        order_id INTEGER PRIMARY KEY,
                        instrument_id INTEGER NOT NULL,
                        party_id TEXT NOT NULL,
                        side TEXT NOT NULL,
                        order_type TEXT NOT NULL,
                        price_cents INTEGER NOT NULL,
                        quantity INTEGER NOT NULL,
                        filled_quantity INTEGER NOT NULL,
                        remaining_quantity INTEGER NOT NULL,
                        cancelled INTEGER NOT NULL,
                        timestamp INTEGER NOT NULL
                    )"
                ),
                [],
            )?;
        }
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS trades_{instrument_id} (
                    trade_id TEXT PRIMARY KEY,
                    instrument_id INTEGER NOT NULL,
                    price_cents INTEGER NOT NULL,
                    quantity INTEGER NOT NULL,
                    timestamp INTEGER NOT NULL,
                    maker_order_id INTEGER NOT NULL,
                    taker_order_id INTEGER NOT NULL,
                    maker_party_id TEXT NOT NULL,
                    taker_party_id TEXT NOT NULL,
                    maker_is_buyer INTEGER NOT NULL,
                    maker_quantity_remaining INTEGER NOT NULL,
                    taker_quantity_remaining INTEGER NOT NULL
                )"
            ),
            [],
        )?;
        Ok(())
    }

    /// Registers an instrument: creates its tables and records it in the
    /// `instruments` directory table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn create_instrument(&self, instrument_id: u32) -> Result<(), StoreError> {
        let conn = self.lock()?;
        Self::ensure_instrument_tables(&conn, instrument_id)?;
        conn.execute(
            "INSERT OR IGNORE INTO instruments (instrument_id, created_at) VALUES (?1, ?2)",
            params![
                instrument_id,
                crate::utils::current_time_nanos() as i64
            ],
        )?;
        trace!(instrument_id, "instrument registered");
        Ok(())
    }

    /// Upserts the full order document keyed by order id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn upsert_order(&self, order: &Order) -> Result<(), StoreError> {
        let conn = self.lock()?;
        Self::ensure_instrument_tables(&conn, order.instrument_id)?;
        Self::replace_order_row(&conn, "orders", order)
    }

    /// Upserts the order into the live-order collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn upsert_live_order(&self, order: &Order) -> Result<(), StoreError> {
        let conn = self.lock()?;
        Self::ensure_instrument_tables(&conn, order.instrument_id)?;
        Self::replace_order_row(&conn, "live_orders", order)
    }

    fn replace_order_row(
        conn: &Connection,
        table: &str,
        order: &Order,
    ) -> Result<(), StoreError> {
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {table}_{} (
                    order_id, instrument_id, party_id, side, order_type,
                    price_cents, quantity, filled_quantity, remaining_quantity,
                    cancelled, timestamp
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                order.instrument_id
            ),
            params![
                order.order_id as i64,
                order.instrument_id,
                order.party_id,
                order.side.to_string(),
                order.order_type.to_string(),
                order.price_cents as i64,
                order.quantity as i64,
                order.filled_quantity as i64,
                order.remaining_quantity as i64,
                order.cancelled,
                order.timestamp as i64,
            ],
        )?;
        Ok(())
    }

    /// Appends a trade document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn insert_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        let conn = self.lock()?;
        Self::ensure_instrument_tables(&conn, trade.instrument_id)?;
        conn.execute(
            &format!(
                "INSERT INTO trades_{} (
                    trade_id, instrument_id, price_cents, quantity, timestamp,
                    maker_order_id, taker_order_id, maker_party_id,
                    taker_party_id, maker_is_buyer, maker_quantity_remaining,
                    taker_quantity_remaining
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                trade.instrument_id
            ),
            params![
                trade.trade_id.to_string(),
                trade.instrument_id,
                trade.price_cents as i64,
                trade.quantity as i64,
                trade.timestamp as i64,
                trade.maker_order_id as i64,
                trade.taker_order_id as i64,
                trade.maker_party_id,
                trade.taker_party_id,
                trade.maker_is_buyer,
                trade.maker_quantity_remaining as i64,
                trade.taker_quantity_remaining as i64,
            ],
        )?;
        Ok(())
    }

    /// Deletes an order from the live-order collection. Deleting an id that
    /// is not present is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn delete_live_order(&self, instrument_id: u32, order_id: u64) -> Result<(), StoreError> {
        let conn = self.lock()?;
        Self::ensure_instrument_tables(&conn, instrument_id)?;
        conn.execute(
            &format!("DELETE FROM live_orders_{instrument_id} WHERE order_id = ?1"),
            params![order_id as i64],
        )?;
        Ok(())
    }

    /// Applies a fill to a live order: remaining decreases and filled
    /// increases by `quantity`. A missing row is left missing; the order was
    /// never live or has already been removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn update_live_quantity(
        &self,
        instrument_id: u32,
        order_id: u64,
        quantity: u64,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        Self::ensure_instrument_tables(&conn, instrument_id)?;
        conn.execute(
            &format!(
                "UPDATE live_orders_{instrument_id}
                 SET remaining_quantity = remaining_quantity - ?1,
                     filled_quantity = filled_quantity + ?1
                 WHERE order_id = ?2"
            ),
            params![quantity as i64, order_id as i64],
        )?;
        Ok(())
    }

    /// Instruments with a persisted orders collection, discovered by table
    /// name convention.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn list_instruments(&self) -> Result<Vec<u32>, StoreError> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'orders\\_%' ESCAPE '\\'",
        )?;
        let names = statement.query_map([], |row| row.get::<_, String>(0))?;
        let mut instrument_ids = Vec::new();
        for name in names {
            let name = name?;
            if let Some(suffix) = name.strip_prefix("orders_")
                && let Ok(instrument_id) = suffix.parse::<u32>()
            {
                instrument_ids.push(instrument_id);
            }
        }
        instrument_ids.sort_unstable();
        Ok(instrument_ids)
    }

    /// All persisted orders for one instrument, ascending by timestamp.
    /// An instrument with no orders collection yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn iter_orders(&self, instrument_id: u32) -> Result<Vec<Order>, StoreError> {
        self.select_orders(&format!("orders_{instrument_id}"))
    }

    /// The currently resting orders for one instrument, ascending by
    /// timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn live_orders(&self, instrument_id: u32) -> Result<Vec<Order>, StoreError> {
        self.select_orders(&format!("live_orders_{instrument_id}"))
    }

    fn select_orders(&self, table: &str) -> Result<Vec<Order>, StoreError> {
        let conn = self.lock()?;
        if !Self::table_exists(&conn, table)? {
            return Ok(Vec::new());
        }
        let mut statement = conn.prepare(&format!(
            "SELECT order_id, instrument_id, party_id, side, order_type,
                    price_cents, quantity, filled_quantity, remaining_quantity,
                    cancelled, timestamp
             FROM {table} ORDER BY timestamp ASC"
        ))?;
        let rows = statement.query_map([], Self::row_to_order)?;
        let mut orders = Vec::new();
        for order in rows {
            orders.push(order?);
        }
        Ok(orders)
    }

    /// All persisted trades for one instrument in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn trades(&self, instrument_id: u32) -> Result<Vec<Trade>, StoreError> {
        let conn = self.lock()?;
        let table = format!("trades_{instrument_id}");
        if !Self::table_exists(&conn, &table)? {
            return Ok(Vec::new());
        }
        let mut statement = conn.prepare(&format!(
            "SELECT trade_id, instrument_id, price_cents, quantity, timestamp,
                    maker_order_id, taker_order_id, maker_party_id,
                    taker_party_id, maker_is_buyer, maker_quantity_remaining,
                    taker_quantity_remaining
             FROM {table} ORDER BY rowid ASC"
        ))?;
        let rows = statement.query_map([], Self::row_to_trade)?;
        let mut trades = Vec::new();
        for trade in rows {
            trades.push(trade?);
        }
        Ok(trades)
    }

    fn table_exists(conn: &Connection, table: &str) -> Result<bool, rusqlite::Error> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn row_to_order(row: &Row<'_>) -> Result<Order, rusqlite::Error> {
        let side_text: String = row.get(3)?;
        let side = side_text
            .parse::<Side>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?;
        let type_text: String = row.get(4)?;
        let order_type = type_text
            .parse::<OrderType>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?;
        Ok(Order {
            order_id: row.get::<_, i64>(0)? as u64,
            instrument_id: row.get(1)?,
            party_id: row.get(2)?,
            side,
            order_type,
            price_cents: row.get::<_, i64>(5)? as u64,
            quantity: row.get::<_, i64>(6)? as u64,
            filled_quantity: row.get::<_, i64>(7)? as u64,
            remaining_quantity: row.get::<_, i64>(8)? as u64,
            cancelled: row.get(9)?,
            timestamp: row.get::<_, i64>(10)? as u64,
        })
    }

    fn row_to_trade(row: &Row<'_>) -> Result<Trade, rusqlite::Error> {
        let id_text: String = row.get(0)?;
        let trade_id = Uuid::parse_str(&id_text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
        Ok(Trade {
            trade_id,
            instrument_id: row.get(1)?,
            price_cents: row.get::<_, i64>(2)? as u64,
            quantity: row.get::<_, i64>(3)? as u64,
            timestamp: row.get::<_, i64>(4)? as u64,
            maker_order_id: row.get::<_, i64>(5)? as u64,
            taker_order_id: row.get::<_, i64>(6)? as u64,
            maker_party_id: row.get(7)?,
            taker_party_id: row.get(8)?,
            maker_is_buyer: row.get(9)?,
            maker_quantity_remaining: row.get::<_, i64>(10)? as u64,
            taker_quantity_remaining: row.get::<_, i64>(11)? as u64,
        })
    }

    /// Durably increments a named counter and returns the new value. The
    /// counter is created at 1 on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn next_counter(&self, name: &str) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO counters (name, seq) VALUES (?1, 1)
             ON CONFLICT(name) DO UPDATE SET seq = seq + 1",
            params![name],
        )?;
        let value: i64 = conn.query_row(
            "SELECT seq FROM counters WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(value as u64)
    }

    /// Reads a named counter, `0` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn counter(&self, name: &str) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let value: Option<i64> = conn
            .query_row(
                "SELECT seq FROM counters WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(value.unwrap_or(0) as u64)
    }

    /// Raises a named counter to at least `floor`, keeping the larger of
    /// the persisted value and `floor`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn ensure_counter_at_least(&self, name: &str, floor: u64) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO counters (name, seq) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET seq = MAX(seq, excluded.seq)",
            params![name, floor as i64],
        )?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}
