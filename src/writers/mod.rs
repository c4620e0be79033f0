//! The fan-out persistence pipeline: a capability trait implemented by every
//! writer, a synchronous composite, the queued durable writer over SQLite,
//! the UDP multicast publisher, and the append-only CSV event log.

mod composite;
mod multicast;
mod queued;
mod sqlite_store;
mod text_log;

pub use composite::CompositeWriter;
pub use multicast::MulticastWriter;
pub use queued::{QueuedStoreWriter, StoreMessage};
pub use sqlite_store::{ACTION_COUNT_COUNTER, ORDER_ID_COUNTER, SqliteStore, StoreError};
pub use text_log::TextLogWriter;

use crate::orders::{Order, Trade};

/// The capability interface every writer in the pipeline implements.
///
/// Hot-path methods take references, return nothing, and must not fail
/// outward: a writer logs and swallows its internal errors so one writer can
/// never break the chain or the dispatcher. The rebuild-side methods
/// ([`ExchangeWriter::list_instruments`] and [`ExchangeWriter::iter_orders`])
/// default to empty results; only writers that can actually replay persisted
/// state override them.
pub trait ExchangeWriter: Send + Sync {
    /// Persists or forwards the full order record. Called for every
    /// accepted order, and again with the cancelled state after a
    /// first-time cancel.
    fn record_order(&self, order: &Order);

    /// Persists or forwards a trade report.
    fn record_trade(&self, trade: &Trade);

    /// Records that `order_id` was cancelled on `instrument_id`.
    fn record_cancel(&self, instrument_id: u32, order_id: u64);

    /// Inserts or replaces a resting order in the live-order set.
    fn upsert_live_order(&self, order: &Order);

    /// Removes an order from the live-order set.
    fn remove_live_order(&self, instrument_id: u32, order_id: u64);

    /// Applies a fill of `quantity` units to a live order: remaining
    /// decreases and filled increases by that amount.
    fn update_order_quantity(&self, instrument_id: u32, order_id: u64, quantity: u64);

    /// Prepares whatever per-instrument structures this writer keeps.
    /// Called once when a book is created.
    fn create_instrument(&self, instrument_id: u32);

    /// Instruments this writer can replay orders for. Defaults to none.
    fn list_instruments(&self) -> Vec<u32> {
        Vec::new()
    }

    /// All persisted orders for one instrument in ascending timestamp
    /// order. Defaults to none.
    fn iter_orders(&self, _instrument_id: u32) -> Vec<Order> {
        Vec::new()
    }
}
