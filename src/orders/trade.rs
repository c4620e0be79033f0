//! Immutable trade reports produced by the matching engine.

use crate::orders::order::Order;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single fill between a resting maker order and an incoming taker order.
///
/// Trades are immutable and append-only: once emitted by the matching engine
/// they are never revised. The trade price is always the maker's limit price,
/// and both remainder fields are captured after the fill was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Unique identifier for this trade.
    pub trade_id: Uuid,
    /// The instrument the trade occurred on.
    pub instrument_id: u32,
    /// Execution price in integer cents, equal to the maker's price.
    pub price_cents: u64,
    /// Quantity exchanged: the smaller of both remainders at match time.
    pub quantity: u64,
    /// Nanosecond wall-clock timestamp of the fill.
    pub timestamp: u64,
    /// The resting order that was in the book before the taker arrived.
    pub maker_order_id: u64,
    /// The incoming order that crossed the book.
    pub taker_order_id: u64,
    /// Owner of the maker order.
    pub maker_party_id: String,
    /// Owner of the taker order.
    pub taker_party_id: String,
    /// `true` when the maker was the buy side of the trade.
    pub maker_is_buyer: bool,
    /// Maker's open quantity after this fill.
    pub maker_quantity_remaining: u64,
    /// Taker's open quantity after this fill.
    pub taker_quantity_remaining: u64,
}

impl Trade {
    /// Builds a trade report from a fill that was already applied to both
    /// orders. Remainders are read post-fill, the price comes from the maker.
    #[must_use]
    pub(crate) fn from_fill(maker: &Order, taker: &Order, quantity: u64, timestamp: u64) -> Self {
        Self {
            trade_id: Uuid::new_v4(),
            instrument_id: maker.instrument_id,
            price_cents: maker.price_cents,
            quantity,
            timestamp,
            maker_order_id: maker.order_id,
            taker_order_id: taker.order_id,
            maker_party_id: maker.party_id.clone(),
            taker_party_id: taker.party_id.clone(),
            maker_is_buyer: maker.side == crate::orders::Side::Buy,
            maker_quantity_remaining: maker.remaining_quantity,
            taker_quantity_remaining: taker.remaining_quantity,
        }
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade {{ instrument: {}, {}@{}, maker: {}, taker: {} }}",
            self.instrument_id,
            self.quantity,
            self.price_cents,
            self.maker_order_id,
            self.taker_order_id
        )
    }
}
