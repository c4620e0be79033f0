//! Cold-start recovery: rebuilding books from the durable store.

use super::common::{accepted, cancel, harness, harness_over, new_book, new_order};
use exchange_core::prelude::*;

/// Drives a workload, restarts the exchange over the same store, and checks
/// the rebuilt books match the pre-restart state.
#[tokio::test]
async fn test_rebuild_round_trip_restores_books_and_ids() {
    let mut h = harness();
    h.durable.startup().await;

    h.exchange.create_book(new_book(1));
    h.exchange.create_book(new_book(2));

    // Book 1: resting orders on both sides, one partial fill, one cancel.
    let (cancelled_id, ..) = accepted(h.exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(9_800),
        4,
        "alice",
    )));
    accepted(h.exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(9_900),
        10,
        "bob",
    )));
    accepted(h.exchange.submit_order(new_order(
        1,
        Side::Sell,
        OrderType::Gtc,
        Some(10_100),
        6,
        "carol",
    )));
    // Partial fill against bob: 3 units trade, bob keeps 7.
    accepted(h.exchange.submit_order(new_order(
        1,
        Side::Sell,
        OrderType::Gtc,
        Some(9_900),
        3,
        "dave",
    )));
    h.exchange.cancel_order(cancel(1, cancelled_id, "alice"));

    // Book 2: a single deep ask ladder.
    for price in [10_000u64, 10_010, 10_020] {
        accepted(h.exchange.submit_order(new_order(
            2,
            Side::Sell,
            OrderType::Gtc,
            Some(price),
            2,
            "eve",
        )));
    }

    let expected_best_bid = h.exchange.book_mut(1).unwrap().best_bid();
    let expected_best_ask = h.exchange.book_mut(1).unwrap().best_ask();
    let mut expected_live: Vec<(u64, u64)> = h
        .exchange
        .book(1)
        .unwrap()
        .open_orders()
        .map(|o| (o.order_id, o.remaining_quantity))
        .collect();
    expected_live.sort_unstable();
    let last_allocated = {
        // Allocate nothing further; remember the largest id seen.
        h.exchange
            .book(1)
            .unwrap()
            .open_orders()
            .map(|o| o.order_id)
            .max()
            .unwrap()
    };

    h.durable.shutdown().await;

    // Restart: fresh dispatcher and writer over the same store.
    let mut restarted = harness_over(h.store);
    restarted
        .exchange
        .rebuild_from_storage(restarted.durable.as_ref())
        .unwrap();

    let mut instruments = restarted.exchange.instrument_ids();
    instruments.sort_unstable();
    assert_eq!(instruments, vec![1, 2]);

    let book = restarted.exchange.book_mut(1).unwrap();
    assert_eq!(book.best_bid(), expected_best_bid);
    assert_eq!(book.best_ask(), expected_best_ask);
    let mut rebuilt_live: Vec<(u64, u64)> = book
        .open_orders()
        .map(|o| (o.order_id, o.remaining_quantity))
        .collect();
    rebuilt_live.sort_unstable();
    assert_eq!(rebuilt_live, expected_live);

    // The cancelled order did not come back.
    assert!(book.order(cancelled_id).is_none());

    let book2 = restarted.exchange.book_mut(2).unwrap();
    assert_eq!(book2.best_ask(), Some(10_000));
    assert_eq!(book2.open_order_count(), 3);

    // New ids continue strictly above everything persisted.
    restarted.exchange.create_book(new_book(3));
    let (new_id, ..) = accepted(restarted.exchange.submit_order(new_order(
        3,
        Side::Buy,
        OrderType::Gtc,
        Some(100),
        1,
        "fred",
    )));
    assert!(new_id > last_allocated);
}

#[tokio::test]
async fn test_rebuild_preserves_time_priority_within_level() {
    let mut h = harness();
    h.durable.startup().await;
    h.exchange.create_book(new_book(1));

    let (first, ..) = accepted(h.exchange.submit_order(new_order(
        1,
        Side::Sell,
        OrderType::Gtc,
        Some(10_000),
        1,
        "a",
    )));
    let (second, ..) = accepted(h.exchange.submit_order(new_order(
        1,
        Side::Sell,
        OrderType::Gtc,
        Some(10_000),
        1,
        "b",
    )));
    h.durable.shutdown().await;

    let mut restarted = harness_over(h.store);
    restarted
        .exchange
        .rebuild_from_storage(restarted.durable.as_ref())
        .unwrap();

    // The earliest persisted order matches first after rebuild.
    let (_, _, _, trades) = accepted(restarted.exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(10_000),
        2,
        "taker",
    )));
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].maker_order_id, first);
    assert_eq!(trades[1].maker_order_id, second);
}

#[tokio::test]
async fn test_rebuild_on_empty_store_is_a_no_op() {
    let mut h = harness();
    h.exchange
        .rebuild_from_storage(h.durable.as_ref())
        .unwrap();
    assert!(h.exchange.instrument_ids().is_empty());
}

#[tokio::test]
async fn test_rebuild_skips_filled_and_cancelled_orders() {
    let mut h = harness();
    h.durable.startup().await;
    h.exchange.create_book(new_book(1));

    // Fully filled pair.
    accepted(h.exchange.submit_order(new_order(
        1,
        Side::Sell,
        OrderType::Gtc,
        Some(10_000),
        2,
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
    // Cancelled resting order.
    let (gone, ..) = accepted(h.exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(9_000),
        1,
        "maker",
    )));
    h.exchange.cancel_order(cancel(1, gone, "maker"));
    h.durable.shutdown().await;

    let mut restarted = harness_over(h.store);
    restarted
        .exchange
        .rebuild_from_storage(restarted.durable.as_ref())
        .unwrap();

    let book = restarted.exchange.book(1).unwrap();
    assert_eq!(book.open_order_count(), 0);
}
