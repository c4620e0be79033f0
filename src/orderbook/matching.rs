//! Matching engine logic: the price-time priority sweep and the per-type
//! submit algorithms.

use super::book::OrderBook;
use crate::orders::{Order, OrderType, Side, Trade};
use crate::utils::current_time_nanos;
use tracing::{debug, trace};

/// The outcome of submitting one order to a book: the order's post-match
/// state and the trades it produced, in match order.
#[derive(Debug, Clone)]
pub struct SubmitResult {
    /// Snapshot of the submitted order after matching. For a rested GTC
    /// residual this mirrors the copy held by the book.
    pub order: Order,
    /// Trades generated by this submission, earliest fill first.
    pub trades: Vec<Trade>,
}

impl SubmitResult {
    /// Total quantity executed across all trades of this submission.
    #[must_use]
    pub fn executed_quantity(&self) -> u64 {
        self.trades.iter().map(|t| t.quantity).sum()
    }
}

impl OrderBook {
    /// Submits an order, dispatching on its type:
    ///
    /// - `MARKET`: sweep the opposite side without a price predicate; stop
    ///   when filled or the side is exhausted. Residual is reported back
    ///   unfilled, neither rested nor flagged cancelled.
    /// - `GTC`: sweep while the best opposing price crosses the limit, then
    ///   rest any residual at the limit level.
    /// - `IOC`: sweep as GTC, then cancel any residual instead of resting.
    ///
    /// # Panics
    ///
    /// An order routed to the wrong book is a programmer error and fails
    /// the process.
    pub fn submit(&mut self, mut order: Order) -> SubmitResult {
        assert_eq!(
            order.instrument_id,
            self.instrument_id(),
            "order {} routed to wrong book",
            order.order_id
        );

        let trades = match order.order_type {
            OrderType::Market => self.sweep(&mut order, None),
            OrderType::Gtc => {
                let limit_price = order.price_cents;
                let trades = self.sweep(&mut order, Some(limit_price));
                if order.remaining_quantity > 0 {
                    self.rest_order(order.clone());
                }
                trades
            }
            OrderType::Ioc => {
                let limit_price = order.price_cents;
                let trades = self.sweep(&mut order, Some(limit_price));
                if order.remaining_quantity > 0 {
                    order.cancel();
                    trace!(order_id = order.order_id, "IOC residue cancelled");
                }
                trades
            }
        };

        self.bump_revision();
        debug!(
            order_id = order.order_id,
            remaining = order.remaining_quantity,
            trades = trades.len(),
            "submit complete"
        );
        SubmitResult { order, trades }
    }

    /// Repeatedly matches `taker` against the opposite side's best level.
    ///
    /// With `limit_price` set, the sweep stops as soon as the best opposing
    /// price no longer crosses it; without one it runs until the taker is
    /// filled or the side is exhausted. Levels emptied by lazy artifacts
    /// (cancelled or filled residue at the head) are pruned transparently
    /// and the search continues.
    fn sweep(&mut self, taker: &mut Order, limit_price: Option<u64>) -> Vec<Trade> {
        let mut trades = Vec::new();

        while taker.remaining_quantity > 0 {
            let (levels, index) = match taker.side {
                Side::Buy => (&mut self.asks, &mut self.ask_index),
                Side::Sell => (&mut self.bids, &mut self.bid_index),
            };

            let Some(best_price) = index.best() else {
                trace!(order_id = taker.order_id, "opposite side exhausted");
                break;
            };
            if let Some(limit) = limit_price {
                let crosses = match taker.side {
                    Side::Buy => best_price <= limit,
                    Side::Sell => best_price >= limit,
                };
                if !crosses {
                    trace!(
                        order_id = taker.order_id,
                        best_price, limit, "no cross, sweep stops"
                    );
                    break;
                }
            }

            let front = match levels.get_mut(&best_price) {
                Some(level) => level.front(&self.orders),
                None => None,
            };
            let Some(maker_id) = front else {
                // Only lazy artifacts were left at this price.
                levels.remove(&best_price);
                index.mark_empty(best_price);
                trace!(price_cents = best_price, "drained level pruned");
                continue;
            };

            let maker = self
                .orders
                .get_mut(&maker_id)
                .expect("front of level resolves to a resting order");
            let quantity = taker.remaining_quantity.min(maker.remaining_quantity);
            maker.fill(quantity);
            taker.fill(quantity);
            let trade = Trade::from_fill(maker, taker, quantity, current_time_nanos());
            let maker_filled = maker.remaining_quantity == 0;

            trace!(
                maker_order_id = maker_id,
                taker_order_id = taker.order_id,
                quantity,
                price_cents = trade.price_cents,
                "trade executed"
            );
            trades.push(trade);

            if maker_filled {
                self.remove_filled(maker_id);
            }
        }

        trades
    }
}
