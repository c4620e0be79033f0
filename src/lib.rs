//! # Multi-Instrument Matching Exchange Core
//!
//! The core of a limit-order matching exchange: per-instrument order books
//! under strict price-time priority, a single-writer dispatcher that
//! validates requests and allocates order ids, and a fan-out persistence
//! pipeline that durably records every action and broadcasts it to
//! market-data consumers.
//!
//! ## Components
//!
//! - **Data model** ([`orders`]): integer-cent prices, explicit
//!   filled/remaining bookkeeping with quantity conservation, immutable
//!   append-only trade reports.
//! - **Order book** ([`orderbook`]): one book per instrument. Each side is a
//!   map of FIFO price levels plus a lazily invalidated best-price index.
//!   `MARKET`, `GTC`, and `IOC` submissions share one sweep; GTC residuals
//!   rest, IOC residuals are cancelled, market residuals are reported back.
//!   Cancellation is idempotent.
//! - **Dispatcher** ([`exchange`]): request validation, durable order-id
//!   allocation, book routing, and the fixed per-action event emission
//!   order. Every error reaches the caller as a structured `ERROR` response.
//! - **Writer pipeline** ([`writers`]): a capability trait implemented by a
//!   queued durable SQLite writer, a best-effort UDP multicast publisher,
//!   and an append-only CSV event logger, composed by a synchronous fan-out.
//!   The durable writer also powers cold-start recovery: books are rebuilt
//!   by resting persisted open orders, and the id allocator reseeds from the
//!   maximum persisted id.
//!
//! ## Concurrency model
//!
//! The engine is single-writer per process. Handlers run to completion on
//! the dispatcher without yielding between validation and event emission, so
//! matching plus the synchronous fan-out is one indivisible step. The only
//! synchronization boundary is the durable writer's queue: producers enqueue
//! without blocking and a background Tokio task applies messages serially,
//! yielding at the queue receive and at each storage round-trip. Storage is
//! eventually consistent with the in-memory engine; observers poll the
//! action counter to detect change.
//!
//! ## Ordering guarantees
//!
//! 1. Per book, the applied action sequence equals arrival order at the
//!    dispatcher.
//! 2. Per accepted action, writer events fire in a fixed order, state
//!    change before derived events.
//! 3. Durable-writer messages for one request are applied in enqueue order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use exchange_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteStore::open("exchange.db")?);
//!     let durable = Arc::new(QueuedStoreWriter::new(Arc::clone(&store)));
//!     let multicast = Arc::new(MulticastWriter::new()?);
//!     let text_log = Arc::new(TextLogWriter::new("text_backup")?);
//!     durable.startup().await;
//!
//!     let writer = CompositeWriter::new(vec![
//!         Arc::clone(&durable) as Arc<dyn ExchangeWriter>,
//!         multicast,
//!         Arc::clone(&text_log),
//!     ]);
//!     let mut exchange = Exchange::new(writer, IdAllocator::new(store));
//!     exchange.rebuild_from_storage(durable.as_ref())?;
//!
//!     exchange.create_book(CreateBookRequest {
//!         instrument_id: 1,
//!         instrument_name: "DEMO".to_string(),
//!         instrument_description: None,
//!         party_id: "admin".to_string(),
//!         password: String::new(),
//!     });
//!     let response = exchange.submit_order(NewOrderRequest {
//!         instrument_id: 1,
//!         side: Side::Sell,
//!         order_type: OrderType::Gtc,
//!         price_cents: Some(10_500),
//!         quantity: 5,
//!         party_id: "alice".to_string(),
//!         password: String::new(),
//!     });
//!     println!("{}", serde_json::to_string(&response)?);
//!
//!     durable.shutdown().await;
//!     text_log.shutdown();
//!     Ok(())
//! }
//! ```

pub mod exchange;
pub mod orderbook;
pub mod orders;
pub mod prelude;
pub mod writers;

mod utils;

pub use exchange::{
    CancelAllRequest, CancelAllResponse, CancelRequest, CancelResponse, CreateBookRequest,
    CreateBookResponse, Exchange, ExchangeError, IdAllocator, NewOrderRequest, NewOrderResponse,
};
pub use orderbook::{DepthSnapshot, LevelDepth, OrderBook, PriceIndex, PriceLevel, SubmitResult};
pub use orders::{Order, OrderType, Side, Trade};
pub use utils::current_time_nanos;
pub use writers::{
    CompositeWriter, ExchangeWriter, MulticastWriter, QueuedStoreWriter, SqliteStore,
    StoreError, StoreMessage, TextLogWriter,
};
