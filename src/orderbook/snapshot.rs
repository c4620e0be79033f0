//! Aggregated depth snapshots for market-data consumers.

use super::book::OrderBook;
use crate::orders::Side;
use serde::{Deserialize, Serialize};

/// Aggregate view of one price level: total open quantity and how many
/// orders contribute to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDepth {
    /// The level's price in integer cents.
    pub price_cents: u64,
    /// Sum of remaining quantity across open orders at this price.
    pub total_quantity: u64,
    /// Number of open orders at this price.
    pub order_count: usize,
}

/// A point-in-time aggregate of a book's resting liquidity.
///
/// Levels are ordered best-first: bids descending, asks ascending. The
/// snapshot carries the book revision it was taken at so pollers can skip
/// unchanged books.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthSnapshot {
    /// The instrument this snapshot describes.
    pub instrument_id: u32,
    /// Book revision at snapshot time.
    pub revision: u64,
    /// Bid levels, highest price first.
    pub bids: Vec<LevelDepth>,
    /// Ask levels, lowest price first.
    pub asks: Vec<LevelDepth>,
}

impl DepthSnapshot {
    /// Best bid level, if any.
    #[must_use]
    pub fn best_bid(&self) -> Option<&LevelDepth> {
        self.bids.first()
    }

    /// Best ask level, if any.
    #[must_use]
    pub fn best_ask(&self) -> Option<&LevelDepth> {
        self.asks.first()
    }
}

impl OrderBook {
    /// Builds an aggregate depth snapshot of the current resting liquidity.
    ///
    /// Levels that currently hold only lazy artifacts are omitted rather
    /// than reported as zero-quantity entries.
    #[must_use]
    pub fn depth_snapshot(&self) -> DepthSnapshot {
        let collect = |side: Side| -> Vec<LevelDepth> {
            let levels = match side {
                Side::Buy => &self.bids,
                Side::Sell => &self.asks,
            };
            let mut depths: Vec<LevelDepth> = levels
                .values()
                .filter_map(|level| {
                    let mut total_quantity = 0u64;
                    let mut order_count = 0usize;
                    for order in level.open_orders(&self.orders) {
                        total_quantity += order.remaining_quantity;
                        order_count += 1;
                    }
                    (order_count > 0).then_some(LevelDepth {
                        price_cents: level.price_cents(),
                        total_quantity,
                        order_count,
                    })
                })
                .collect();
            match side {
                Side::Buy => depths.sort_by(|a, b| b.price_cents.cmp(&a.price_cents)),
                Side::Sell => depths.sort_by(|a, b| a.price_cents.cmp(&b.price_cents)),
            }
            depths
        };

        DepthSnapshot {
            instrument_id: self.instrument_id(),
            revision: self.revision(),
            bids: collect(Side::Buy),
            asks: collect(Side::Sell),
        }
    }
}
