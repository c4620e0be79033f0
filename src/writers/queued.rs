//! The queued durable writer: non-blocking producers, one background
//! consumer, at-least-once application to the SQLite store.

use super::sqlite_store::{ACTION_COUNT_COUNTER, SqliteStore, StoreError};
use super::ExchangeWriter;
use crate::orders::{Order, Trade};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A typed message on the durable writer's queue.
#[derive(Debug, Clone)]
pub enum StoreMessage {
    /// Upsert the order document under its order id.
    Order(Order),
    /// Append the trade document.
    Trade(Trade),
    /// Delete the order from the live-order collection.
    Cancel {
        /// Instrument the order lived on.
        instrument_id: u32,
        /// The cancelled order.
        order_id: u64,
    },
    /// Upsert the order into the live-order collection.
    UpsertLive(Order),
    /// Delete from the live-order collection by order id.
    RemoveLive {
        /// Instrument the order lived on.
        instrument_id: u32,
        /// The removed order.
        order_id: u64,
    },
    /// Apply a fill to a live order's remaining/filled quantities.
    UpdateLive {
        /// Instrument the order lives on.
        instrument_id: u32,
        /// The filled order.
        order_id: u64,
        /// Fill size to apply.
        quantity: u64,
    },
}

/// Durable writer with a background consumer draining an in-memory queue.
///
/// Hot-path methods enqueue without blocking and bump the process-wide
/// action counter; the consumer applies messages serially, in enqueue order,
/// yielding at the queue receive and at each storage round-trip. Storage is
/// therefore eventually consistent with the in-memory engine; there is no
/// cross-request serializability with the store.
///
/// The queue is unbounded by default, preferring correctness over latency
/// under overload. [`QueuedStoreWriter::with_max_queue_len`] installs a cap
/// with a drop-with-alert overflow policy instead.
pub struct QueuedStoreWriter {
    store: Arc<SqliteStore>,
    sender: Mutex<Option<UnboundedSender<StoreMessage>>>,
    receiver: Mutex<Option<UnboundedReceiver<StoreMessage>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    action_count: AtomicU64,
    queue_depth: Arc<AtomicU64>,
    max_queue_len: Option<u64>,
}

impl QueuedStoreWriter {
    /// Creates a writer over the given store. The consumer does not run
    /// until [`QueuedStoreWriter::startup`] is awaited.
    #[must_use]
    pub fn new(store: Arc<SqliteStore>) -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            store,
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            consumer: Mutex::new(None),
            action_count: AtomicU64::new(0),
            queue_depth: Arc::new(AtomicU64::new(0)),
            max_queue_len: None,
        }
    }

    /// Caps the queue at `max_queue_len` messages. Messages arriving while
    /// the queue is full are dropped with a warning instead of blocking the
    /// dispatcher.
    #[must_use = "builders do nothing unless consumed"]
    pub fn with_max_queue_len(mut self, max_queue_len: u64) -> Self {
        self.max_queue_len = Some(max_queue_len);
        self
    }

    /// The store this writer persists into.
    #[must_use]
    pub fn store(&self) -> Arc<SqliteStore> {
        Arc::clone(&self.store)
    }

    /// Number of producer calls observed so far. Monotonic; observers poll
    /// this to detect change cheaply.
    #[must_use]
    pub fn action_count(&self) -> u64 {
        self.action_count.load(Ordering::Relaxed)
    }

    /// Messages currently waiting for the consumer.
    #[must_use]
    pub fn queue_depth(&self) -> u64 {
        self.queue_depth.load(Ordering::Relaxed)
    }

    /// Spawns the background consumer. Idempotent: a second call while the
    /// consumer runs is a no-op.
    pub async fn startup(&self) {
        let receiver = match self.receiver.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => {
                error!("durable writer receiver mutex poisoned");
                return;
            }
        };
        let Some(mut receiver) = receiver else {
            warn!("durable writer consumer already started");
            return;
        };

        let store = Arc::clone(&self.store);
        let queue_depth = Arc::clone(&self.queue_depth);
        let handle = tokio::spawn(async move {
            info!("durable writer consumer started");
            while let Some(message) = receiver.recv().await {
                queue_depth.fetch_sub(1, Ordering::Relaxed);
                let store = Arc::clone(&store);
                match tokio::task::spawn_blocking(move || apply_message(&store, &message)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => warn!(%error, "durable write failed"),
                    Err(error) => error!(%error, "durable write task failed"),
                }
            }
            info!("durable writer consumer stopped");
        });

        match self.consumer.lock() {
            Ok(mut guard) => *guard = Some(handle),
            Err(_) => error!("durable writer consumer mutex poisoned"),
        }
    }

    /// Closes the producer side, drains the queue to completion, and joins
    /// the consumer. Must be awaited before process exit for the
    /// at-least-once guarantee to hold.
    pub async fn shutdown(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
        let handle = match self.consumer.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            if let Err(error) = handle.await {
                error!(%error, "durable writer consumer join failed");
            }
        }
    }

    fn enqueue(&self, message: StoreMessage) {
        self.action_count.fetch_add(1, Ordering::Relaxed);

        if let Some(max) = self.max_queue_len
            && self.queue_depth.load(Ordering::Relaxed) >= max
        {
            warn!(max, "durable writer queue full, message dropped");
            return;
        }

        match self.sender.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(sender) => {
                    if sender.send(message).is_ok() {
                        self.queue_depth.fetch_add(1, Ordering::Relaxed);
                    } else {
                        warn!("durable writer consumer gone, message dropped");
                    }
                }
                None => warn!("durable writer shut down, message dropped"),
            },
            Err(_) => error!("durable writer sender mutex poisoned"),
        }
    }
}

/// Applies one message to the store and bumps the persisted action counter.
fn apply_message(store: &SqliteStore, message: &StoreMessage) -> Result<(), StoreError> {
    match message {
        StoreMessage::Order(order) => store.upsert_order(order)?,
        StoreMessage::Trade(trade) => store.insert_trade(trade)?,
        StoreMessage::Cancel {
            instrument_id,
            order_id,
        } => store.delete_live_order(*instrument_id, *order_id)?,
        StoreMessage::UpsertLive(order) => store.upsert_live_order(order)?,
        StoreMessage::RemoveLive {
            instrument_id,
            order_id,
        } => store.delete_live_order(*instrument_id, *order_id)?,
        StoreMessage::UpdateLive {
            instrument_id,
            order_id,
            quantity,
        } => store.update_live_quantity(*instrument_id, *order_id, *quantity)?,
    }
    store.next_counter(ACTION_COUNT_COUNTER)?;
    Ok(())
}

impl ExchangeWriter for QueuedStoreWriter {
    fn record_order(&self, order: &Order) {
        self.enqueue(StoreMessage::Order(order.clone()));
    }

    fn record_trade(&self, trade: &Trade) {
        self.enqueue(StoreMessage::Trade(trade.clone()));
    }

    fn record_cancel(&self, instrument_id: u32, order_id: u64) {
        self.enqueue(StoreMessage::Cancel {
            instrument_id,
            order_id,
        });
    }

    fn upsert_live_order(&self, order: &Order) {
        self.enqueue(StoreMessage::UpsertLive(order.clone()));
    }

    fn remove_live_order(&self, instrument_id: u32, order_id: u64) {
        self.enqueue(StoreMessage::RemoveLive {
            instrument_id,
            order_id,
        });
    }

    fn update_order_quantity(&self, instrument_id: u32, order_id: u64, quantity: u64) {
        self.enqueue(StoreMessage::UpdateLive {
            instrument_id,
            order_id,
            quantity,
        });
    }

    fn create_instrument(&self, instrument_id: u32) {
        // Collection creation is rare and synchronous so the tables exist
        // before any queued message lands.
        if let Err(error) = self.store.create_instrument(instrument_id) {
            warn!(%error, instrument_id, "instrument registration failed");
        }
    }

    fn list_instruments(&self) -> Vec<u32> {
        match self.store.list_instruments() {
            Ok(instrument_ids) => instrument_ids,
            Err(error) => {
                error!(%error, "list_instruments failed");
                Vec::new()
            }
        }
    }

    fn iter_orders(&self, instrument_id: u32) -> Vec<Order> {
        match self.store.iter_orders(instrument_id) {
            Ok(orders) => orders,
            Err(error) => {
                error!(%error, instrument_id, "iter_orders failed");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for QueuedStoreWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedStoreWriter")
            .field("action_count", &self.action_count.load(Ordering::Relaxed))
            .field("queue_depth", &self.queue_depth.load(Ordering::Relaxed))
            .field("max_queue_len", &self.max_queue_len)
            .finish_non_exhaustive()
    }
}
