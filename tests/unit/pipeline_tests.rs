//! Writer pipeline behavior: event emission order, queue draining, and the
//! CSV event log.

use super::common::{accepted, cancel, harness, new_book, new_order};
use exchange_core::prelude::*;
use std::sync::{Arc, Mutex};

/// Captures every writer call in arrival order.
#[derive(Default)]
struct RecordingWriter {
    calls: Mutex<Vec<String>>,
}

impl RecordingWriter {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ExchangeWriter for RecordingWriter {
    fn record_order(&self, order: &Order) {
        self.push(format!("record_order:{}", order.order_id));
    }

    fn record_trade(&self, trade: &Trade) {
        self.push(format!(
            "record_trade:{}x{}",
            trade.quantity, trade.price_cents
        ));
    }

    fn record_cancel(&self, _instrument_id: u32, order_id: u64) {
        self.push(format!("record_cancel:{order_id}"));
    }

    fn upsert_live_order(&self, order: &Order) {
        self.push(format!("upsert_live:{}", order.order_id));
    }

    fn remove_live_order(&self, _instrument_id: u32, order_id: u64) {
        self.push(format!("remove_live:{order_id}"));
    }

    fn update_order_quantity(&self, _instrument_id: u32, order_id: u64, quantity: u64) {
        self.push(format!("update_quantity:{order_id}:{quantity}"));
    }

    fn create_instrument(&self, instrument_id: u32) {
        self.push(format!("create_instrument:{instrument_id}"));
    }
}

fn recording_exchange() -> (Exchange, Arc<RecordingWriter>) {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let recorder = Arc::new(RecordingWriter::default());
    let writer = CompositeWriter::new(vec![Arc::clone(&recorder) as Arc<dyn ExchangeWriter>]);
    let exchange = Exchange::new(writer, IdAllocator::new(store));
    (exchange, recorder)
}

#[test]
fn test_resting_gtc_emits_upsert_then_record() {
    let (mut exchange, recorder) = recording_exchange();
    exchange.create_book(new_book(1));

    let (order_id, ..) = accepted(exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(9_900),
        5,
        "alice",
    )));

    assert_eq!(
        recorder.calls(),
        vec![
            "create_instrument:1".to_string(),
            format!("upsert_live:{order_id}"),
            format!("record_order:{order_id}"),
        ]
    );
}

#[test]
fn test_trade_events_follow_the_fixed_order() {
    let (mut exchange, recorder) = recording_exchange();
    exchange.create_book(new_book(1));

    let (maker_id, ..) = accepted(exchange.submit_order(new_order(
        1,
        Side::Sell,
        OrderType::Gtc,
        Some(10_500),
        5,
        "maker",
    )));
    recorder.calls.lock().unwrap().clear();

    // Taker fully fills against the maker; maker keeps a residual.
    let (taker_id, ..) = accepted(exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(11_000),
        3,
        "taker",
    )));

    assert_eq!(
        recorder.calls(),
        vec![
            format!("record_order:{taker_id}"),
            "record_trade:3x10500".to_string(),
            format!("update_quantity:{maker_id}:3"),
            format!("remove_live:{taker_id}"),
        ]
    );
}

#[test]
fn test_fully_filled_maker_gets_remove_live() {
    let (mut exchange, recorder) = recording_exchange();
    exchange.create_book(new_book(1));

    let (maker_id, ..) = accepted(exchange.submit_order(new_order(
        1,
        Side::Sell,
        OrderType::Gtc,
        Some(10_000),
        2,
        "maker",
    )));
    recorder.calls.lock().unwrap().clear();

    // Taker overfills the maker and rests the residual.
    let (taker_id, ..) = accepted(exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(10_000),
        5,
        "taker",
    )));

    assert_eq!(
        recorder.calls(),
        vec![
            format!("upsert_live:{taker_id}"),
            format!("record_order:{taker_id}"),
            "record_trade:2x10000".to_string(),
            format!("remove_live:{maker_id}"),
            format!("update_quantity:{taker_id}:2"),
        ]
    );
}

#[test]
fn test_cancel_emits_cancel_remove_record() {
    let (mut exchange, recorder) = recording_exchange();
    exchange.create_book(new_book(1));
    let (order_id, ..) = accepted(exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(9_900),
        5,
        "alice",
    )));
    recorder.calls.lock().unwrap().clear();

    exchange.cancel_order(cancel(1, order_id, "alice"));
    assert_eq!(
        recorder.calls(),
        vec![
            format!("record_cancel:{order_id}"),
            format!("remove_live:{order_id}"),
            format!("record_order:{order_id}"),
        ]
    );

    // A repeat cancel emits nothing.
    recorder.calls.lock().unwrap().clear();
    exchange.cancel_order(cancel(1, order_id, "alice"));
    assert!(recorder.calls().is_empty());
}

#[test]
fn test_ioc_residue_is_not_upserted_live() {
    let (mut exchange, recorder) = recording_exchange();
    exchange.create_book(new_book(1));
    recorder.calls.lock().unwrap().clear();

    let (order_id, ..) = accepted(exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Ioc,
        Some(9_900),
        5,
        "alice",
    )));

    // No cross: just the order record, no live-order traffic.
    assert_eq!(recorder.calls(), vec![format!("record_order:{order_id}")]);
}

#[tokio::test]
async fn test_durable_writer_applies_messages_in_enqueue_order() {
    let mut h = harness();
    h.durable.startup().await;
    h.exchange.create_book(new_book(1));

    let (maker_id, ..) = accepted(h.exchange.submit_order(new_order(
        1,
        Side::Sell,
        OrderType::Gtc,
        Some(10_000),
        5,
        "maker",
    )));
    accepted(h.exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(10_000),
        2,
        "taker",
    )));

    h.durable.shutdown().await;

    // The maker's live row saw the upsert first, then the fill delta.
    let live = h.store.live_orders(1).unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].order_id, maker_id);
    assert_eq!(live[0].remaining_quantity, 3);
    assert_eq!(live[0].filled_quantity, 2);
    assert_eq!(h.store.trades(1).unwrap().len(), 1);
}

#[tokio::test]
async fn test_action_count_tracks_producer_calls() {
    let mut h = harness();
    h.durable.startup().await;
    h.exchange.create_book(new_book(1));
    assert_eq!(h.durable.action_count(), 0);

    // Resting GTC: upsert_live + record_order.
    accepted(h.exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(9_900),
        5,
        "alice",
    )));
    assert_eq!(h.durable.action_count(), 2);

    h.durable.shutdown().await;
    // The persisted counter saw one bump per applied message.
    assert_eq!(h.store.counter(ACTION_COUNT_COUNTER).unwrap(), 2);
}

#[tokio::test]
async fn test_shutdown_drains_pending_messages() {
    let mut h = harness();
    h.exchange.create_book(new_book(1));
    for i in 0..50 {
        accepted(h.exchange.submit_order(new_order(
            1,
            Side::Buy,
            OrderType::Gtc,
            Some(9_000 + i),
            1,
            "alice",
        )));
    }

    // Start the consumer only now: everything is still queued.
    h.durable.startup().await;
    h.durable.shutdown().await;

    assert_eq!(h.store.live_orders(1).unwrap().len(), 50);
    assert_eq!(h.store.iter_orders(1).unwrap().len(), 50);
    assert_eq!(h.durable.queue_depth(), 0);
}

#[tokio::test]
async fn test_text_log_writes_headers_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let text_log = Arc::new(TextLogWriter::new(dir.path()).unwrap());
    let writer = CompositeWriter::new(vec![Arc::clone(&text_log) as Arc<dyn ExchangeWriter>]);
    let mut exchange = Exchange::new(writer, IdAllocator::new(store));

    exchange.create_book(new_book(9));
    let (sell_id, ..) = accepted(exchange.submit_order(new_order(
        9,
        Side::Sell,
        OrderType::Gtc,
        Some(10_500),
        5,
        "alice",
    )));
    accepted(exchange.submit_order(new_order(
        9,
        Side::Buy,
        OrderType::Gtc,
        Some(10_500),
        2,
        "bob",
    )));
    exchange.cancel_order(cancel(9, sell_id, "alice"));
    text_log.shutdown();

    let orders = std::fs::read_to_string(dir.path().join("orders_9.csv")).unwrap();
    let mut lines = orders.lines();
    assert!(lines.next().unwrap().starts_with("order_type,side,instrument_id"));
    // Two accepted orders plus the cancelled re-record.
    assert_eq!(lines.count(), 3);

    let trades = std::fs::read_to_string(dir.path().join("trades_9.csv")).unwrap();
    assert_eq!(trades.lines().count(), 2);

    let cancels = std::fs::read_to_string(dir.path().join("cancels_9.csv")).unwrap();
    assert_eq!(cancels.lines().count(), 2);

    let live = std::fs::read_to_string(dir.path().join("live_events_9.csv")).unwrap();
    let live_rows: Vec<&str> = live.lines().skip(1).collect();
    // Sell upsert, sell remove (fill side is taker: fully filled), cancel
    // remove, in schedule order: UPS_LIVE sell, remove for taker, then the
    // cancel's remove.
    assert!(live_rows[0].starts_with("UPS_LIVE"));
    assert!(live_rows.iter().any(|row| row.starts_with("REM_LIVE")));
}

#[tokio::test]
async fn test_queue_cap_drops_with_alert_instead_of_blocking() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let durable = QueuedStoreWriter::new(Arc::clone(&store)).with_max_queue_len(3);

    for order_id in 1..=10u64 {
        durable.record_cancel(1, order_id);
    }
    // Producer calls are all counted even when the queue is capped.
    assert_eq!(durable.action_count(), 10);
    assert!(durable.queue_depth() <= 3);
}
