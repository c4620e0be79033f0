//! End-to-end dispatcher scenarios over the full pipeline.

use super::common::{accepted, cancel, error_details, harness, new_book, new_order};
use exchange_core::prelude::*;

#[tokio::test]
async fn test_partial_fill_then_cancel_clears_book() {
    let mut h = harness();
    h.durable.startup().await;
    h.exchange.create_book(new_book(1));

    let (sell_id, sell_remaining, _, trades) = accepted(h.exchange.submit_order(new_order(
        1,
        Side::Sell,
        OrderType::Gtc,
        Some(10_500),
        5,
        "alice",
    )));
    assert_eq!(sell_remaining, 5);
    assert!(trades.is_empty());

    let (_, buy_remaining, _, trades) = accepted(h.exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(11_000),
        3,
        "bob",
    )));
    assert_eq!(buy_remaining, 0);
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].quantity, 3);
    assert_eq!(trades[0].price_cents, 10_500);
    assert_eq!(trades[0].maker_order_id, sell_id);

    let response = h.exchange.cancel_order(cancel(1, sell_id, "alice"));
    assert!(matches!(
        response,
        CancelResponse::Cancelled { order_id } if order_id == sell_id
    ));
    assert_eq!(h.exchange.book(1).unwrap().open_order_count(), 0);

    // Once the queue drains, the live-order collection is empty too and the
    // final order records carry their terminal state.
    h.durable.shutdown().await;
    assert!(h.store.live_orders(1).unwrap().is_empty());
    let persisted = h.store.iter_orders(1).unwrap();
    assert_eq!(persisted.len(), 2);
    let sell = persisted.iter().find(|o| o.order_id == sell_id).unwrap();
    assert!(sell.cancelled);
    assert_eq!(sell.remaining_quantity, 0);
    assert_eq!(h.store.trades(1).unwrap().len(), 1);
}

#[tokio::test]
async fn test_market_order_walks_the_ask_ladder() {
    let mut h = harness();
    h.exchange.create_book(new_book(2));

    for (price, quantity) in [(10_000, 1), (10_005, 2), (10_010, 3)] {
        accepted(h.exchange.submit_order(new_order(
            2,
            Side::Sell,
            OrderType::Gtc,
            Some(price),
            quantity,
            "maker",
        )));
    }

    let (_, remaining, cancelled, trades) = accepted(h.exchange.submit_order(new_order(
        2,
        Side::Buy,
        OrderType::Market,
        None,
        4,
        "taker",
    )));
    assert_eq!(remaining, 0);
    assert!(!cancelled);
    let fills: Vec<(u64, u64)> = trades.iter().map(|t| (t.quantity, t.price_cents)).collect();
    assert_eq!(fills, vec![(1, 10_000), (2, 10_005), (1, 10_010)]);

    let book = h.exchange.book_mut(2).unwrap();
    assert_eq!(book.best_ask(), Some(10_010));
    let residual = book.open_orders().next().unwrap();
    assert_eq!(residual.remaining_quantity, 2);
}

#[tokio::test]
async fn test_market_order_on_empty_book() {
    let mut h = harness();
    h.exchange.create_book(new_book(3));

    let (_, remaining, cancelled, trades) = accepted(h.exchange.submit_order(new_order(
        3,
        Side::Buy,
        OrderType::Market,
        None,
        2,
        "taker",
    )));
    assert!(trades.is_empty());
    assert_eq!(remaining, 2);
    assert!(!cancelled);
    assert!(h.exchange.book(3).unwrap().is_empty());
}

#[tokio::test]
async fn test_ioc_without_cross_is_cancelled() {
    let mut h = harness();
    h.exchange.create_book(new_book(4));

    accepted(h.exchange.submit_order(new_order(
        4,
        Side::Sell,
        OrderType::Gtc,
        Some(10_200),
        1,
        "maker",
    )));
    let (_, remaining, cancelled, trades) = accepted(h.exchange.submit_order(new_order(
        4,
        Side::Buy,
        OrderType::Ioc,
        Some(9_900),
        1,
        "taker",
    )));

    assert!(trades.is_empty());
    assert!(cancelled);
    assert_eq!(remaining, 0);
    assert_eq!(h.exchange.book_mut(4).unwrap().best_ask(), Some(10_200));
}

#[tokio::test]
async fn test_unknown_instrument_changes_nothing() {
    let mut h = harness();
    h.durable.startup().await;

    let details = error_details(h.exchange.submit_order(new_order(
        77,
        Side::Buy,
        OrderType::Gtc,
        Some(10_000),
        1,
        "alice",
    )));
    assert_eq!(details, "unknown instrument");

    h.durable.shutdown().await;
    assert!(h.store.list_instruments().unwrap().is_empty());
    // Rejected requests emit no events at all.
    assert_eq!(h.durable.action_count(), 0);
}

#[tokio::test]
async fn test_validation_failures_are_error_responses() {
    let mut h = harness();
    h.exchange.create_book(new_book(1));

    let details = error_details(h.exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        None,
        1,
        "alice",
    )));
    assert!(details.contains("price_cents"));

    let details = error_details(h.exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(10_000),
        0,
        "alice",
    )));
    assert!(details.contains("quantity"));

    let details = error_details(h.exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(10_000),
        1,
        "",
    )));
    assert!(details.contains("party_id"));
}

#[tokio::test]
async fn test_duplicate_book_is_rejected() {
    let mut h = harness();
    assert!(matches!(
        h.exchange.create_book(new_book(1)),
        CreateBookResponse::Created { instrument_id: 1 }
    ));
    assert!(matches!(
        h.exchange.create_book(new_book(1)),
        CreateBookResponse::Error { .. }
    ));
}

#[tokio::test]
async fn test_repeat_cancel_is_an_error_without_state_change() {
    let mut h = harness();
    h.exchange.create_book(new_book(1));
    let (order_id, ..) = accepted(h.exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(9_900),
        4,
        "alice",
    )));

    assert!(matches!(
        h.exchange.cancel_order(cancel(1, order_id, "alice")),
        CancelResponse::Cancelled { .. }
    ));
    let revision_after_first = h.exchange.book(1).unwrap().revision();

    let response = h.exchange.cancel_order(cancel(1, order_id, "alice"));
    match response {
        CancelResponse::Error { details } => assert_eq!(details, "order not open"),
        other => panic!("expected ERROR, got {other:?}"),
    }
    assert_eq!(h.exchange.book(1).unwrap().revision(), revision_after_first);
}

#[tokio::test]
async fn test_cancel_all_cancels_only_the_party() {
    let mut h = harness();
    h.durable.startup().await;
    h.exchange.create_book(new_book(1));

    let (alice_1, ..) = accepted(h.exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(9_900),
        1,
        "alice",
    )));
    let (bob_1, ..) = accepted(h.exchange.submit_order(new_order(
        1,
        Side::Buy,
        OrderType::Gtc,
        Some(9_800),
        2,
        "bob",
    )));
    let (alice_2, ..) = accepted(h.exchange.submit_order(new_order(
        1,
        Side::Sell,
        OrderType::Gtc,
        Some(10_100),
        3,
        "alice",
    )));

    let response = h.exchange.cancel_all(CancelAllRequest {
        instrument_id: 1,
        party_id: "alice".to_string(),
        password: String::new(),
    });
    match response {
        CancelAllResponse::CancelledAll {
            mut cancelled_order_ids,
            failed_order_ids,
        } => {
            cancelled_order_ids.sort_unstable();
            assert_eq!(cancelled_order_ids, vec![alice_1, alice_2]);
            assert!(failed_order_ids.is_empty());
        }
        other => panic!("expected CANCELLED_ALL, got {other:?}"),
    }

    let book = h.exchange.book(1).unwrap();
    assert_eq!(book.open_order_count(), 1);
    assert!(book.order(bob_1).is_some());

    // The cancelled snapshots were persisted with their terminal state.
    h.durable.shutdown().await;
    for order_id in [alice_1, alice_2] {
        let persisted = h
            .store
            .iter_orders(1)
            .unwrap()
            .into_iter()
            .find(|o| o.order_id == order_id)
            .unwrap();
        assert!(persisted.cancelled);
        assert_eq!(persisted.remaining_quantity, 0);
    }
}

#[tokio::test]
async fn test_order_ids_are_strictly_increasing_across_books() {
    let mut h = harness();
    h.exchange.create_book(new_book(1));
    h.exchange.create_book(new_book(2));

    let mut last = 0;
    for instrument_id in [1, 2, 1, 2, 1] {
        let (order_id, ..) = accepted(h.exchange.submit_order(new_order(
            instrument_id,
            Side::Buy,
            OrderType::Gtc,
            Some(9_900),
            1,
            "alice",
        )));
        assert!(order_id > last, "id {order_id} not greater than {last}");
        last = order_id;
    }
}

#[tokio::test]
async fn test_payload_handlers_accept_json() {
    let mut h = harness();
    h.exchange.create_book(new_book(1));

    let response = h.exchange.handle_new_order(serde_json::json!({
        "instrument_id": 1,
        "side": "SELL",
        "order_type": "GTC",
        "price_cents": 10_500,
        "quantity": 5,
        "party_id": "alice",
        "password": "pw"
    }));
    let (order_id, remaining, ..) = accepted(response);
    assert_eq!(remaining, 5);

    let response = h.exchange.handle_cancel(serde_json::json!({
        "instrument_id": 1,
        "order_id": order_id,
        "party_id": "alice",
        "password": "pw"
    }));
    assert!(matches!(response, CancelResponse::Cancelled { .. }));

    // A malformed payload is an ERROR envelope, not a panic.
    let response = h
        .exchange
        .handle_new_order(serde_json::json!({"side": "SIDEWAYS"}));
    assert!(matches!(response, NewOrderResponse::Error { .. }));
}
