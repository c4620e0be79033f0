//! Core order book: per-instrument price levels, resting-order index, and
//! cancellation.

use super::price_index::PriceIndex;
use super::price_level::PriceLevel;
use crate::orders::{Order, Side};
use std::collections::HashMap;
use tracing::trace;

/// A single instrument's limit order book.
///
/// Each side is a map from price to [`PriceLevel`] plus a [`PriceIndex`] for
/// best-price lookup. Resting orders are owned by the book's `orders` index;
/// levels queue order ids only, so an order is always owned by exactly one
/// place and lazy level pruning can never dangle.
///
/// The book is single-writer: all mutating operations take `&mut self` and
/// none of them blocks or performs I/O.
#[derive(Debug)]
pub struct OrderBook {
    instrument_id: u32,
    pub(super) bids: HashMap<u64, PriceLevel>,
    pub(super) asks: HashMap<u64, PriceLevel>,
    pub(super) bid_index: PriceIndex,
    pub(super) ask_index: PriceIndex,
    /// Resting-order index: order id to the open order, used for cancel and
    /// for party scans. Orders leave this map when filled or cancelled.
    pub(super) orders: HashMap<u64, Order>,
    /// Advisory change counter: bumped on every state-altering operation so
    /// observers can poll "has anything changed?".
    revision: u64,
}

impl OrderBook {
    /// Creates an empty book for the given instrument.
    #[must_use]
    pub fn new(instrument_id: u32) -> Self {
        trace!(instrument_id, "order book created");
        Self {
            instrument_id,
            bids: HashMap::new(),
            asks: HashMap::new(),
            bid_index: PriceIndex::new(Side::Buy),
            ask_index: PriceIndex::new(Side::Sell),
            orders: HashMap::new(),
            revision: 0,
        }
    }

    /// The instrument this book matches.
    #[must_use]
    #[inline]
    pub fn instrument_id(&self) -> u32 {
        self.instrument_id
    }

    /// Current value of the advisory revision counter.
    #[must_use]
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    pub(super) fn bump_revision(&mut self) {
        self.revision += 1;
    }

    /// Highest resting buy price, if any.
    pub fn best_bid(&mut self) -> Option<u64> {
        self.bid_index.best()
    }

    /// Lowest resting sell price, if any.
    pub fn best_ask(&mut self) -> Option<u64> {
        self.ask_index.best()
    }

    /// Best ask minus best bid, when both sides are populated.
    pub fn spread(&mut self) -> Option<u64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.saturating_sub(bid)),
            _ => None,
        }
    }

    /// Looks up a resting order by id.
    #[must_use]
    pub fn order(&self, order_id: u64) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    /// Iterates all resting orders in no particular order.
    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    /// Number of resting orders.
    #[must_use]
    pub fn open_order_count(&self) -> usize {
        self.orders.len()
    }

    /// Returns `true` when nothing rests on either side.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Rests an order at its limit price: creates the level if absent,
    /// queues the order at the tail, and records it in the resting-order
    /// index. Used for GTC residuals and for cold-start rebuild.
    ///
    /// # Panics
    ///
    /// Resting an order that targets another instrument, is not open, or
    /// reuses a resting id is a programmer error and fails the process.
    pub fn rest_order(&mut self, order: Order) {
        assert_eq!(
            order.instrument_id, self.instrument_id,
            "order {} routed to wrong book",
            order.order_id
        );
        assert!(
            order.is_open(),
            "order {} rested without open quantity",
            order.order_id
        );

        let (levels, index) = match order.side {
            Side::Buy => (&mut self.bids, &mut self.bid_index),
            Side::Sell => (&mut self.asks, &mut self.ask_index),
        };
        levels
            .entry(order.price_cents)
            .or_insert_with(|| PriceLevel::new(order.price_cents))
            .push(order.order_id);
        index.push(order.price_cents);

        trace!(
            order_id = order.order_id,
            price_cents = order.price_cents,
            side = %order.side,
            "order rested"
        );
        let previous = self.orders.insert(order.order_id, order);
        assert!(previous.is_none(), "resting order id reused");
        self.bump_revision();
    }

    /// Idempotent cancel.
    ///
    /// Returns `true` only when this call transitions a known open order to
    /// cancelled. Repeat cancels and unknown ids return `false` and leave
    /// the book untouched. A successful cancel removes the order from the
    /// resting-order index immediately and eagerly drops its level when that
    /// leaves the level empty, marking the price invalid in the index; the
    /// level queue entry itself is cleaned up by lazy pruning.
    pub fn cancel(&mut self, order_id: u64) -> bool {
        let Some(mut order) = self.orders.remove(&order_id) else {
            trace!(order_id, "cancel miss");
            return false;
        };
        order.cancel();
        trace!(order_id, "order cancelled");

        let price_cents = order.price_cents;
        let (levels, index) = match order.side {
            Side::Buy => (&mut self.bids, &mut self.bid_index),
            Side::Sell => (&mut self.asks, &mut self.ask_index),
        };
        let drained = match levels.get_mut(&price_cents) {
            Some(level) => level.is_empty(&self.orders),
            None => true,
        };
        if drained {
            levels.remove(&price_cents);
            index.mark_empty(price_cents);
        }

        self.bump_revision();
        true
    }

    /// Removes a fully filled maker from the resting-order index and, when
    /// its level drained, from the side map and price index. Matching calls
    /// this the moment a maker's remainder reaches zero.
    pub(super) fn remove_filled(&mut self, order_id: u64) {
        let Some(order) = self.orders.remove(&order_id) else {
            return;
        };
        debug_assert_eq!(order.remaining_quantity, 0);

        let price_cents = order.price_cents;
        let (levels, index) = match order.side {
            Side::Buy => (&mut self.bids, &mut self.bid_index),
            Side::Sell => (&mut self.asks, &mut self.ask_index),
        };
        let drained = match levels.get_mut(&price_cents) {
            Some(level) => level.is_empty(&self.orders),
            None => false,
        };
        if drained {
            levels.remove(&price_cents);
            index.mark_empty(price_cents);
        }
    }
}
