//! Order-id allocation backed by the durable counter store.

use crate::writers::{ORDER_ID_COUNTER, SqliteStore, StoreError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Allocates process-wide unique, strictly increasing order ids.
///
/// The persisted counter in the store is the source of truth: every
/// allocation increments it durably, so ids survive restarts without reuse.
/// The last allocated value is cached in memory for cheap observation.
#[derive(Debug)]
pub struct IdAllocator {
    store: Arc<SqliteStore>,
    last_allocated: AtomicU64,
}

impl IdAllocator {
    /// Creates an allocator over the given store. The cache starts at the
    /// counter's persisted value, or zero when the counter does not exist
    /// yet.
    #[must_use]
    pub fn new(store: Arc<SqliteStore>) -> Self {
        let current = store.counter(ORDER_ID_COUNTER).unwrap_or(0);
        Self {
            store,
            last_allocated: AtomicU64::new(current),
        }
    }

    /// Durably allocates the next order id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the counter cannot be incremented; no id
    /// is consumed in that case.
    pub fn next(&self) -> Result<u64, StoreError> {
        let order_id = self.store.next_counter(ORDER_ID_COUNTER)?;
        self.last_allocated.store(order_id, Ordering::Relaxed);
        Ok(order_id)
    }

    /// The most recently allocated id, `0` before the first allocation.
    #[must_use]
    pub fn last_allocated(&self) -> u64 {
        self.last_allocated.load(Ordering::Relaxed)
    }

    /// Raises the counter so the next allocation returns a value strictly
    /// greater than `last_seen`. Used by cold-start rebuild: the counter
    /// keeps whichever is greater, its persisted value or `last_seen`.
    pub fn seed_at_least(&self, last_seen: u64) -> Result<(), StoreError> {
        self.store
            .ensure_counter_at_least(ORDER_ID_COUNTER, last_seen)?;
        let current = self.store.counter(ORDER_ID_COUNTER)?;
        self.last_allocated.store(current, Ordering::Relaxed);
        debug!(last_seen, current, "order id allocator seeded");
        Ok(())
    }
}
