//! Property tests over random submission sequences, checking the
//! invariants a single Book must hold after every accepted request.

use chrono::Utc;
use order_book_engine::book::{Book, SubmitOrder};
use order_book_engine::order::{OrderType, Side};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Action {
    direction: Side,
    order_type: OrderType,
    price: i64,
    qty: i64,
    account: &'static str,
}

fn action_strategy() -> impl Strategy<Value = Action> {
    (
        prop_oneof![Just(Side::Buy), Just(Side::Sell)],
        prop_oneof![
            Just(OrderType::Limit),
            Just(OrderType::Market),
            Just(OrderType::ImmediateOrCancel),
            Just(OrderType::FillOrKill),
        ],
        95i64..=105,
        1i64..=20,
        prop_oneof![Just("A"), Just("B"), Just("C")],
    )
        .prop_map(|(direction, order_type, price, qty, account)| Action {
            direction,
            order_type,
            price,
            qty,
            account,
        })
}

fn submit(a: &Action) -> SubmitOrder {
    SubmitOrder {
        venue: "TESTEX".into(),
        symbol: Some("FOO".into()),
        stock: None,
        direction: a.direction,
        order_type: a.order_type,
        price: a.price,
        qty: a.qty,
        account: a.account.into(),
    }
}

fn check_invariants(b: &Book) {
    // I1: no-cross.
    if let (Some((&bid, _)), Some((&ask, _))) = (b.bids.iter().next_back(), b.asks.iter().next()) {
        assert!(bid < ask, "crossed book: bid {bid} >= ask {ask}");
    }

    let mut total_fill_qty = 0i64;
    for order in b.id_index.values() {
        // I2: conservation.
        assert_eq!(
            order.total_filled + order.qty,
            order.original_qty,
            "conservation violated for order {}",
            order.id
        );
        // I3 (one direction): a fully filled order is always closed.
        if order.qty == 0 {
            assert!(!order.open, "order {} has qty 0 but is still open", order.id);
        }
        // I4: ladder membership.
        let ladder = match order.direction {
            Side::Buy => &b.bids,
            Side::Sell => &b.asks,
        };
        let on_ladder = ladder
            .get(&order.price)
            .is_some_and(|q| q.contains(&order.id));
        assert_eq!(
            on_ladder,
            order.belongs_on_ladder(),
            "ladder membership mismatch for order {}",
            order.id
        );
        // I5: fill field-equality is checked at cross time below; here just
        // sum fill qty towards I7.
        total_fill_qty += order.fills.iter().map(|f| f.qty).sum::<i64>();
    }

    // I7: every trade contributes to exactly two orders' fill lists.
    assert_eq!(total_fill_qty % 2, 0, "total fill qty must be even");

    // I6: dense, monotone ids with no gaps or repeats.
    let mut ids: Vec<u64> = b.id_index.keys().copied().collect();
    ids.sort_unstable();
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(*id, i as u64, "ids are not dense/monotone");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn invariants_hold_after_every_accepted_submission(actions in prop::collection::vec(action_strategy(), 0..60)) {
        let mut b = Book::new("TESTEX", "FOO");
        for action in &actions {
            let _ = b.parse_order(submit(action), Utc::now());
            check_invariants(&b);
        }
    }

    #[test]
    fn cancel_is_idempotent_for_any_reachable_order(actions in prop::collection::vec(action_strategy(), 1..30)) {
        let mut b = Book::new("TESTEX", "FOO");
        let mut ids = Vec::new();
        for action in &actions {
            if let Ok(order) = b.parse_order(submit(action), Utc::now()) {
                ids.push(order.id);
            }
        }
        for id in ids {
            let first = b.cancel_order(id).unwrap();
            let second = b.cancel_order(id).unwrap();
            prop_assert_eq!(first.qty, second.qty);
            prop_assert_eq!(first.open, second.open);
            prop_assert!(!second.open);
        }
    }
}

#[test]
fn fill_recorded_on_resting_and_incoming_order_are_field_equal() {
    let mut b = Book::new("TESTEX", "FOO");
    b.parse_order(
        SubmitOrder {
            venue: "TESTEX".into(),
            symbol: Some("FOO".into()),
            stock: None,
            direction: Side::Sell,
            order_type: OrderType::Limit,
            price: 100,
            qty: 10,
            account: "maker".into(),
        },
        Utc::now(),
    )
    .unwrap();
    let taker = b
        .parse_order(
            SubmitOrder {
                venue: "TESTEX".into(),
                symbol: Some("FOO".into()),
                stock: None,
                direction: Side::Buy,
                order_type: OrderType::Limit,
                price: 100,
                qty: 4,
                account: "taker".into(),
            },
            Utc::now(),
        )
        .unwrap();

    let maker = b.get_status(0).unwrap();
    assert_eq!(taker.fills, maker.fills);
    assert_eq!(taker.fills[0].price, 100);
}
