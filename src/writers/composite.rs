//! Synchronous fan-out over an ordered set of writers.

use super::ExchangeWriter;
use crate::orders::{Order, Trade};
use std::sync::Arc;

/// Fans every writer operation out to an ordered tuple of writers.
///
/// Each method is invoked on each writer in construction order. For the
/// rebuild-side methods the first writer's result is the composite's result
/// and the other writers' results are discarded; everything else returns
/// nothing. Writers swallow their own errors, so one failing writer never
/// breaks the chain.
pub struct CompositeWriter {
    writers: Vec<Arc<dyn ExchangeWriter>>,
}

impl CompositeWriter {
    /// Builds a composite over the given writers. The first writer is the
    /// one rebuild reads from; it should be the durable one.
    #[must_use]
    pub fn new(writers: Vec<Arc<dyn ExchangeWriter>>) -> Self {
        Self { writers }
    }

    /// Number of writers in the chain.
    #[must_use]
    pub fn writer_count(&self) -> usize {
        self.writers.len()
    }
}

impl ExchangeWriter for CompositeWriter {
    fn record_order(&self, order: &Order) {
        for writer in &self.writers {
            writer.record_order(order);
        }
    }

    fn record_trade(&self, trade: &Trade) {
        for writer in &self.writers {
            writer.record_trade(trade);
        }
    }

    fn record_cancel(&self, instrument_id: u32, order_id: u64) {
        for writer in &self.writers {
            writer.record_cancel(instrument_id, order_id);
        }
    }

    fn upsert_live_order(&self, order: &Order) {
        for writer in &self.writers {
            writer.upsert_live_order(order);
        }
    }

    fn remove_live_order(&self, instrument_id: u32, order_id: u64) {
        for writer in &self.writers {
            writer.remove_live_order(instrument_id, order_id);
        }
    }

    fn update_order_quantity(&self, instrument_id: u32, order_id: u64, quantity: u64) {
        for writer in &self.writers {
            writer.update_order_quantity(instrument_id, order_id, quantity);
        }
    }

    fn create_instrument(&self, instrument_id: u32) {
        for writer in &self.writers {
            writer.create_instrument(instrument_id);
        }
    }

    fn list_instruments(&self) -> Vec<u32> {
        let mut writers = self.writers.iter();
        let first = writers
            .next()
            .map(|writer| writer.list_instruments())
            .unwrap_or_default();
        for writer in writers {
            let _ = writer.list_instruments();
        }
        first
    }

    fn iter_orders(&self, instrument_id: u32) -> Vec<Order> {
        let mut writers = self.writers.iter();
        let first = writers
            .next()
            .map(|writer| writer.iter_orders(instrument_id))
            .unwrap_or_default();
        for writer in writers {
            let _ = writer.iter_orders(instrument_id);
        }
        first
    }
}

impl std::fmt::Debug for CompositeWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeWriter")
            .field("writer_count", &self.writers.len())
            .finish_non_exhaustive()
    }
}
