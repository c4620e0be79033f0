//! The exchange dispatcher: validation, order-id allocation, book routing,
//! and the contract that every accepted action emits a deterministic
//! sequence of writer events.

mod error;
mod id_allocator;
mod requests;
mod responses;

pub use error::ExchangeError;
pub use id_allocator::IdAllocator;
pub use requests::{CancelAllRequest, CancelRequest, CreateBookRequest, NewOrderRequest};
pub use responses::{CancelAllResponse, CancelResponse, CreateBookResponse, NewOrderResponse};

use crate::orderbook::OrderBook;
use crate::orders::{Order, OrderType, Trade};
use crate::utils::current_time_nanos;
use crate::writers::{CompositeWriter, ExchangeWriter, StoreError};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// The multi-instrument exchange core.
///
/// Owns one [`OrderBook`] per instrument, the durable id allocator, and the
/// composite writer the event stream fans out through. The dispatcher is
/// single-writer: handlers take `&mut self`, run to completion without
/// yielding, and emit their events while still holding that serialization,
/// so for any one book the applied action order equals arrival order and
/// event order per action is fixed.
pub struct Exchange {
    books: HashMap<u32, OrderBook>,
    writer: CompositeWriter,
    ids: IdAllocator,
}

impl Exchange {
    /// Creates an exchange with no books.
    #[must_use]
    pub fn new(writer: CompositeWriter, ids: IdAllocator) -> Self {
        Self {
            books: HashMap::new(),
            writer,
            ids,
        }
    }

    /// Read access to a book, mainly for observers and tests.
    #[must_use]
    pub fn book(&self, instrument_id: u32) -> Option<&OrderBook> {
        self.books.get(&instrument_id)
    }

    /// Mutable access to a book, for observers that need best-price lookups.
    pub fn book_mut(&mut self, instrument_id: u32) -> Option<&mut OrderBook> {
        self.books.get_mut(&instrument_id)
    }

    /// Instruments that currently have a book.
    #[must_use]
    pub fn instrument_ids(&self) -> Vec<u32> {
        self.books.keys().copied().collect()
    }

    /// Validates and executes a new-order request.
    ///
    /// On success the order receives a fresh id and timestamp, is matched
    /// against its book, and the resulting events are emitted in the fixed
    /// order: live-order upsert for a resting GTC residual, the order record
    /// itself, then per trade the trade record followed by live-order
    /// maintenance for both sides.
    pub fn submit_order(&mut self, request: NewOrderRequest) -> NewOrderResponse {
        debug!(
            instrument_id = request.instrument_id,
            side = %request.side,
            order_type = %request.order_type,
            quantity = request.quantity,
            price_cents = request.price_cents,
            party_id = %request.party_id,
            "new-order received"
        );
        if let Err(error) = request.validate() {
            warn!(%error, "new-order validation failed");
            return NewOrderResponse::error(&error);
        }

        let Some(book) = self.books.get_mut(&request.instrument_id) else {
            warn!(
                instrument_id = request.instrument_id,
                "new-order for unknown instrument"
            );
            return NewOrderResponse::error(&ExchangeError::UnknownInstrument {
                instrument_id: request.instrument_id,
            });
        };

        let order_id = match self.ids.next() {
            Ok(order_id) => order_id,
            Err(error) => {
                warn!(%error, "order id allocation failed");
                return NewOrderResponse::error(&ExchangeError::Storage {
                    message: error.to_string(),
                });
            }
        };

        let order = Order::new(
            order_id,
            request.instrument_id,
            request.party_id.clone(),
            request.side,
            request.order_type,
            request.effective_price(),
            request.quantity,
            current_time_nanos(),
        );
        let result = book.submit(order);

        self.emit_new_order_events(&result.order, &result.trades);
        info!(
            order_id,
            remaining_qty = result.order.remaining_quantity,
            trades = result.trades.len(),
            "new-order accepted"
        );
        NewOrderResponse::Accepted {
            order_id,
            remaining_qty: result.order.remaining_quantity,
            cancelled: result.order.cancelled,
            trades: result.trades,
        }
    }

    /// Validates and executes a cancel request.
    ///
    /// Cancellation is idempotent at the book level; only a first-time
    /// cancel emits events. Repeat cancels and unknown ids come back as
    /// an `ERROR` response with no events.
    pub fn cancel_order(&mut self, request: CancelRequest) -> CancelResponse {
        debug!(
            instrument_id = request.instrument_id,
            order_id = request.order_id,
            party_id = %request.party_id,
            "cancel received"
        );
        if let Err(error) = request.validate() {
            warn!(%error, "cancel validation failed");
            return CancelResponse::error(&error);
        }

        let Some(book) = self.books.get_mut(&request.instrument_id) else {
            warn!(
                instrument_id = request.instrument_id,
                "cancel for unknown instrument"
            );
            return CancelResponse::error(&ExchangeError::UnknownInstrument {
                instrument_id: request.instrument_id,
            });
        };

        // Snapshot before cancelling: the book drops the order from its
        // index on success, and the persisted record must carry the
        // cancelled state.
        let snapshot = book.order(request.order_id).cloned();
        if book.cancel(request.order_id) {
            self.writer
                .record_cancel(request.instrument_id, request.order_id);
            self.writer
                .remove_live_order(request.instrument_id, request.order_id);
            if let Some(mut order) = snapshot {
                order.cancel();
                self.writer.record_order(&order);
            }
            info!(order_id = request.order_id, "order cancelled");
            CancelResponse::Cancelled {
                order_id: request.order_id,
            }
        } else {
            info!(order_id = request.order_id, "cancel miss");
            CancelResponse::error(&ExchangeError::OrderNotOpen {
                order_id: request.order_id,
            })
        }
    }

    /// Cancels every open order the requesting party holds on one book.
    ///
    /// The scan works over a snapshot of the live orders, so orders that die
    /// while the loop runs are reported in `failed_order_ids` rather than
    /// cancelled twice. Each first-time cancel emits the same events as a
    /// single cancel.
    pub fn cancel_all(&mut self, request: CancelAllRequest) -> CancelAllResponse {
        debug!(
            instrument_id = request.instrument_id,
            party_id = %request.party_id,
            "cancel-all received"
        );
        if let Err(error) = request.validate() {
            warn!(%error, "cancel-all validation failed");
            return CancelAllResponse::error(&error);
        }

        let Some(book) = self.books.get_mut(&request.instrument_id) else {
            warn!(
                instrument_id = request.instrument_id,
                "cancel-all for unknown instrument"
            );
            return CancelAllResponse::error(&ExchangeError::UnknownInstrument {
                instrument_id: request.instrument_id,
            });
        };

        let targets: Vec<Order> = book
            .open_orders()
            .filter(|order| order.party_id == request.party_id)
            .cloned()
            .collect();

        let mut cancelled_order_ids = Vec::new();
        let mut failed_order_ids = Vec::new();
        for mut order in targets {
            let order_id = order.order_id;
            if book.cancel(order_id) {
                order.cancel();
                self.writer.record_cancel(request.instrument_id, order_id);
                self.writer
                    .remove_live_order(request.instrument_id, order_id);
                self.writer.record_order(&order);
                cancelled_order_ids.push(order_id);
            } else {
                failed_order_ids.push(order_id);
            }
        }

        info!(
            instrument_id = request.instrument_id,
            party_id = %request.party_id,
            cancelled = cancelled_order_ids.len(),
            failed = failed_order_ids.len(),
            "cancel-all complete"
        );
        CancelAllResponse::CancelledAll {
            cancelled_order_ids,
            failed_order_ids,
        }
    }

    /// Creates an empty book for a new instrument and notifies the writers.
    pub fn create_book(&mut self, request: CreateBookRequest) -> CreateBookResponse {
        if let Err(error) = request.validate() {
            warn!(%error, "new-book validation failed");
            return CreateBookResponse::error(&error);
        }
        if self.books.contains_key(&request.instrument_id) {
            warn!(
                instrument_id = request.instrument_id,
                "new-book for existing instrument"
            );
            return CreateBookResponse::error(&ExchangeError::DuplicateInstrument {
                instrument_id: request.instrument_id,
            });
        }

        self.books
            .insert(request.instrument_id, OrderBook::new(request.instrument_id));
        self.writer.create_instrument(request.instrument_id);
        info!(
            instrument_id = request.instrument_id,
            total_books = self.books.len(),
            "book created"
        );
        CreateBookResponse::Created {
            instrument_id: request.instrument_id,
        }
    }

    /// Cold-start rebuild: recreates a fresh book for every instrument the
    /// durable source enumerates and rests all persisted open orders back
    /// into it in ascending timestamp order. No matching is performed; the
    /// persisted state was produced by a book that never rests crossing
    /// orders.
    ///
    /// The id allocator is seeded to the maximum persisted order id, so ids
    /// allocated after restart stay strictly increasing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the allocator counter cannot be reseeded.
    pub fn rebuild_from_storage(&mut self, source: &dyn ExchangeWriter) -> Result<(), StoreError> {
        info!("rebuilding books from storage");
        let mut max_order_id = 0u64;

        for instrument_id in source.list_instruments() {
            let mut book = OrderBook::new(instrument_id);
            info!(instrument_id, "rebuild started");

            let mut restored = 0usize;
            for order in source.iter_orders(instrument_id) {
                max_order_id = max_order_id.max(order.order_id);
                if order.cancelled || order.remaining_quantity == 0 {
                    continue;
                }
                book.rest_order(order);
                restored += 1;
            }

            info!(instrument_id, restored, "rebuild complete");
            self.books.insert(instrument_id, book);
        }

        if max_order_id > 0 {
            self.ids.seed_at_least(max_order_id)?;
        }
        info!(books = self.books.len(), "rebuild finished, ready to serve");
        Ok(())
    }

    /// Emits the fixed event sequence for an accepted order.
    fn emit_new_order_events(&self, order: &Order, trades: &[Trade]) {
        if order.order_type == OrderType::Gtc && order.remaining_quantity > 0 && !order.cancelled {
            self.writer.upsert_live_order(order);
        }
        self.writer.record_order(order);

        for trade in trades {
            self.writer.record_trade(trade);
            for (order_id, remaining) in [
                (trade.maker_order_id, trade.maker_quantity_remaining),
                (trade.taker_order_id, trade.taker_quantity_remaining),
            ] {
                if remaining == 0 {
                    self.writer.remove_live_order(trade.instrument_id, order_id);
                } else {
                    self.writer
                        .update_order_quantity(trade.instrument_id, order_id, trade.quantity);
                }
            }
        }
    }
}

/// Payload-level handlers: deserialize a JSON payload, then dispatch.
///
/// These mirror the wire surface one-to-one; malformed payloads come back as
/// `ERROR` responses instead of deserialization panics.
impl Exchange {
    /// Deserializes and executes a new-order payload.
    pub fn handle_new_order(&mut self, payload: serde_json::Value) -> NewOrderResponse {
        match serde_json::from_value::<NewOrderRequest>(payload) {
            Ok(request) => self.submit_order(request),
            Err(error) => {
                warn!(%error, "malformed new-order payload");
                NewOrderResponse::Error {
                    details: error.to_string(),
                }
            }
        }
    }

    /// Deserializes and executes a cancel payload.
    pub fn handle_cancel(&mut self, payload: serde_json::Value) -> CancelResponse {
        match serde_json::from_value::<CancelRequest>(payload) {
            Ok(request) => self.cancel_order(request),
            Err(error) => {
                warn!(%error, "malformed cancel payload");
                CancelResponse::Error {
                    details: error.to_string(),
                }
            }
        }
    }

    /// Deserializes and executes a cancel-all payload.
    pub fn handle_cancel_all(&mut self, payload: serde_json::Value) -> CancelAllResponse {
        match serde_json::from_value::<CancelAllRequest>(payload) {
            Ok(request) => self.cancel_all(request),
            Err(error) => {
                warn!(%error, "malformed cancel-all payload");
                CancelAllResponse::Error {
                    details: error.to_string(),
                }
            }
        }
    }

    /// Deserializes and executes a new-book payload.
    pub fn handle_new_book(&mut self, payload: serde_json::Value) -> CreateBookResponse {
        match serde_json::from_value::<CreateBookRequest>(payload) {
            Ok(request) => self.create_book(request),
            Err(error) => {
                warn!(%error, "malformed new-book payload");
                CreateBookResponse::Error {
                    details: error.to_string(),
                }
            }
        }
    }
}
