//! Shared fixtures for the integration tests.

use exchange_core::prelude::*;
use std::sync::Arc;

/// An exchange wired to an in-memory store through the full writer chain.
pub struct Harness {
    pub exchange: Exchange,
    pub durable: Arc<QueuedStoreWriter>,
    pub store: Arc<SqliteStore>,
}

/// Builds a harness whose composite contains only the durable writer.
/// The consumer is not started; call `durable.startup().await` when the
/// test needs persistence applied.
pub fn harness() -> Harness {
    let store = Arc::new(SqliteStore::open_in_memory().expect("in-memory store opens"));
    harness_over(store)
}

/// Builds a harness over an existing store, e.g. for restart scenarios.
pub fn harness_over(store: Arc<SqliteStore>) -> Harness {
    let durable = Arc::new(QueuedStoreWriter::new(Arc::clone(&store)));
    let writer = CompositeWriter::new(vec![Arc::clone(&durable) as Arc<dyn ExchangeWriter>]);
    let exchange = Exchange::new(writer, IdAllocator::new(Arc::clone(&store)));
    Harness {
        exchange,
        durable,
        store,
    }
}

pub fn new_order(
    instrument_id: u32,
    side: Side,
    order_type: OrderType,
    price_cents: Option<u64>,
    quantity: u64,
    party_id: &str,
) -> NewOrderRequest {
    NewOrderRequest {
        instrument_id,
        side,
        order_type,
        price_cents,
        quantity,
        party_id: party_id.to_string(),
        password: String::new(),
    }
}

pub fn cancel(instrument_id: u32, order_id: u64, party_id: &str) -> CancelRequest {
    CancelRequest {
        instrument_id,
        order_id,
        party_id: party_id.to_string(),
        password: String::new(),
    }
}

pub fn new_book(instrument_id: u32) -> CreateBookRequest {
    CreateBookRequest {
        instrument_id,
        instrument_name: format!("INST-{instrument_id}"),
        instrument_description: None,
        party_id: "admin".to_string(),
        password: String::new(),
    }
}

/// Unwraps an accepted new-order response.
pub fn accepted(response: NewOrderResponse) -> (u64, u64, bool, Vec<Trade>) {
    match response {
        NewOrderResponse::Accepted {
            order_id,
            remaining_qty,
            cancelled,
            trades,
        } => (order_id, remaining_qty, cancelled, trades),
        NewOrderResponse::Error { details } => panic!("expected ACCEPTED, got ERROR: {details}"),
    }
}

/// Extracts the `details` string of an error response.
pub fn error_details(response: NewOrderResponse) -> String {
    match response {
        NewOrderResponse::Error { details } => details,
        other => panic!("expected ERROR, got {other:?}"),
    }
}
