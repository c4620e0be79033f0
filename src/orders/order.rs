//! Order value objects: sides, order types, and the order itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The side of an order: whether it buys or sells the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// A buy order. Rests on the bid side of the book.
    Buy,
    /// A sell order. Rests on the ask side of the book.
    Sell,
}

impl Side {
    /// Returns the opposite side.
    #[must_use]
    #[inline]
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("invalid side '{other}'")),
        }
    }
}

/// The execution policy of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Execute immediately against the opposite side without a price limit.
    /// Any residual after the opposite side is exhausted is reported back
    /// unfilled; it neither rests nor is flagged cancelled.
    Market,
    /// Good-till-cancelled limit order. Matches while the book crosses, then
    /// rests any residual at its limit price.
    Gtc,
    /// Immediate-or-cancel limit order. Matches while the book crosses; any
    /// residual is cancelled instead of resting.
    Ioc,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Gtc => write!(f, "GTC"),
            OrderType::Ioc => write!(f, "IOC"),
        }
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MARKET" => Ok(OrderType::Market),
            "GTC" => Ok(OrderType::Gtc),
            "IOC" => Ok(OrderType::Ioc),
            other => Err(format!("invalid order_type '{other}'")),
        }
    }
}

/// A single order as tracked by the exchange.
///
/// `quantity` is the original size and never changes after creation;
/// `filled_quantity` and `remaining_quantity` are maintained together so that
/// `filled_quantity + remaining_quantity == quantity` holds for every open
/// order. Cancelling zeroes the remainder and permanently closes the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Process-wide unique, strictly increasing identifier.
    pub order_id: u64,
    /// The instrument (book) this order targets.
    pub instrument_id: u32,
    /// Opaque owner identity, compared byte-wise.
    pub party_id: String,
    /// Buy or sell.
    pub side: Side,
    /// Execution policy.
    pub order_type: OrderType,
    /// Limit price in integer cents. Zero (and unused) for market orders.
    pub price_cents: u64,
    /// Original quantity. Immutable after creation.
    pub quantity: u64,
    /// Quantity filled so far.
    pub filled_quantity: u64,
    /// Quantity still open. Zero once fully filled or cancelled.
    pub remaining_quantity: u64,
    /// Set once the order has been cancelled, explicitly or as IOC residue.
    pub cancelled: bool,
    /// Nanosecond wall-clock timestamp assigned by the dispatcher.
    pub timestamp: u64,
}

impl Order {
    /// Creates a new open order with nothing filled yet.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        order_id: u64,
        instrument_id: u32,
        party_id: String,
        side: Side,
        order_type: OrderType,
        price_cents: u64,
        quantity: u64,
        timestamp: u64,
    ) -> Self {
        Self {
            order_id,
            instrument_id,
            party_id,
            side,
            order_type,
            price_cents,
            quantity,
            filled_quantity: 0,
            remaining_quantity: quantity,
            cancelled: false,
            timestamp,
        }
    }

    /// Applies a fill of `quantity` units.
    ///
    /// # Panics
    ///
    /// Filling more than the remaining quantity or filling a cancelled order
    /// is a programmer error in the matching engine and fails the process.
    pub fn fill(&mut self, quantity: u64) {
        assert!(
            !self.cancelled,
            "order {} filled after cancellation",
            self.order_id
        );
        assert!(
            quantity <= self.remaining_quantity,
            "order {} fill {} exceeds remaining {}",
            self.order_id,
            quantity,
            self.remaining_quantity
        );
        self.filled_quantity += quantity;
        self.remaining_quantity -= quantity;
    }

    /// Marks the order cancelled and zeroes the open remainder.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.remaining_quantity = 0;
    }

    /// Returns `true` when every unit of the original quantity has traded.
    #[must_use]
    #[inline]
    pub fn is_filled(&self) -> bool {
        self.remaining_quantity == 0 && !self.cancelled
    }

    /// Returns `true` while the order is eligible to rest or match: not
    /// cancelled and with open quantity left.
    #[must_use]
    #[inline]
    pub fn is_open(&self) -> bool {
        !self.cancelled && self.remaining_quantity > 0
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order {{ id: {}, instrument: {}, {} {} {}@{} rem {} }}",
            self.order_id,
            self.instrument_id,
            self.side,
            self.order_type,
            self.quantity,
            self.price_cents,
            self.remaining_quantity
        )
    }
}
