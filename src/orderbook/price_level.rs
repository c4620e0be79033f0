//! A single price level: the FIFO queue of resting orders at one price.

use crate::orders::Order;
use std::collections::{HashMap, VecDeque};

/// The FIFO queue of resting order ids at one price.
///
/// The level stores order ids only; the orders themselves live in the book's
/// resting-order index. Insertion order is preserved, which is what gives
/// time priority within a price. Ids whose order has been filled or
/// cancelled are pruned lazily from the front as the level is observed, so
/// a level may briefly hold dead ids (or be logically empty) until the next
/// observation.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    price_cents: u64,
    queue: VecDeque<u64>,
}

impl PriceLevel {
    /// Creates an empty level at the given price.
    #[must_use]
    pub fn new(price_cents: u64) -> Self {
        Self {
            price_cents,
            queue: VecDeque::new(),
        }
    }

    /// The price this level represents.
    #[must_use]
    #[inline]
    pub fn price_cents(&self) -> u64 {
        self.price_cents
    }

    /// Appends an order id to the tail of the queue.
    #[inline]
    pub fn push(&mut self, order_id: u64) {
        self.queue.push_back(order_id);
    }

    /// Drops dead ids from the front: ids that no longer resolve to an open
    /// order in the resting-order index.
    fn prune_front(&mut self, orders: &HashMap<u64, Order>) {
        while let Some(order_id) = self.queue.front() {
            match orders.get(order_id) {
                Some(order) if order.is_open() => break,
                _ => {
                    self.queue.pop_front();
                }
            }
        }
    }

    /// Returns the id of the earliest open order at this level, pruning any
    /// dead ids encountered on the way.
    pub fn front(&mut self, orders: &HashMap<u64, Order>) -> Option<u64> {
        self.prune_front(orders);
        self.queue.front().copied()
    }

    /// Returns `true` when no open order remains at this level.
    pub fn is_empty(&mut self, orders: &HashMap<u64, Order>) -> bool {
        self.prune_front(orders);
        self.queue.is_empty()
    }

    /// Number of ids currently queued, dead entries included.
    #[must_use]
    #[inline]
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Iterates the open orders at this level in time priority, skipping
    /// dead ids without pruning them.
    pub fn open_orders<'a>(
        &'a self,
        orders: &'a HashMap<u64, Order>,
    ) -> impl Iterator<Item = &'a Order> + 'a {
        self.queue
            .iter()
            .filter_map(|order_id| orders.get(order_id))
            .filter(|order| order.is_open())
    }
}
