//! Best-price lookup per book side with lazy invalidation.

use crate::orders::Side;
use std::collections::{BinaryHeap, HashSet};

/// Tracks which prices on one side of a book currently hold liquidity and
/// answers best-price queries in amortized logarithmic time.
///
/// The index is a heap of every price ever pushed plus a set of currently
/// valid prices. [`PriceIndex::mark_empty`] only removes from the set, so
/// stale heap entries survive until a [`PriceIndex::best`] call walks past
/// them and discards them. A price that is re-pushed after being marked
/// empty becomes valid again without duplicating heap entries.
#[derive(Debug)]
pub struct PriceIndex {
    side: Side,
    heap: BinaryHeap<i128>,
    valid: HashSet<u64>,
}

impl PriceIndex {
    /// Creates an empty index for one side of a book. Bids answer `best`
    /// with the maximum valid price, asks with the minimum.
    #[must_use]
    pub fn new(side: Side) -> Self {
        Self {
            side,
            heap: BinaryHeap::new(),
            valid: HashSet::new(),
        }
    }

    /// Heap key ordering: a max-heap over this key yields the most
    /// aggressive price first for either side.
    #[inline]
    fn key(&self, price_cents: u64) -> i128 {
        match self.side {
            Side::Buy => price_cents as i128,
            Side::Sell => -(price_cents as i128),
        }
    }

    #[inline]
    fn price_of(&self, key: i128) -> u64 {
        key.unsigned_abs() as u64
    }

    /// Records that `price_cents` holds liquidity. Idempotent: pushing an
    /// already valid price changes nothing.
    pub fn push(&mut self, price_cents: u64) {
        if self.valid.insert(price_cents) {
            self.heap.push(self.key(price_cents));
        }
    }

    /// Lazily invalidates a price. Subsequent [`PriceIndex::best`] calls
    /// will not return it unless it is pushed again.
    pub fn mark_empty(&mut self, price_cents: u64) {
        self.valid.remove(&price_cents);
    }

    /// Returns the best valid price for this side, discarding stale heap
    /// entries as they are encountered.
    pub fn best(&mut self) -> Option<u64> {
        while let Some(&key) = self.heap.peek() {
            let price = self.price_of(key);
            if self.valid.contains(&price) {
                return Some(price);
            }
            self.heap.pop();
        }
        None
    }

    /// Returns `true` when no valid price remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }
}
