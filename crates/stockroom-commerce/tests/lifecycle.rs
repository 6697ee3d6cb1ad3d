//! Order and payment state transitions after checkout.

mod common;

use common::*;
use stockroom_commerce::prelude::*;

fn place(shop: &Shop, user: &str, payment: PaymentResult) -> (VariantId, OrderView) {
    let v = variant(shop, &format!("V-{user}"), 1200, 10);
    let user = UserId::new(user);
    shop.carts.add_item(&user, &v, 3).unwrap();
    let view = shop
        .checkout
        .checkout(&user, "1 Main St", payment, None)
        .unwrap();
    (v, view)
}

#[test]
fn order_runs_to_delivery() {
    let shop = Shop::default();
    let (v, placed) = place(&shop, "alice", card());
    let id = placed.order.id.clone();

    let paid = shop.orders.mark_paid(&id).unwrap();
    assert_eq!(paid.order.status, OrderStatus::Paid);
    assert_eq!(paid.payment.unwrap().status, PaymentStatus::Captured);

    assert_eq!(shop.orders.ship(&id).unwrap().order.status, OrderStatus::Shipped);
    let delivered = shop.orders.deliver(&id).unwrap();
    assert_eq!(delivered.order.status, OrderStatus::Delivered);
    assert_eq!(delivered.payment.unwrap().status, PaymentStatus::Captured);

    // Shipping and delivery never move stock.
    assert_eq!(levels(&shop, &v), (7, 0));
    assert_balanced(&shop);
}

#[test]
fn cancelling_a_pending_order_voids_payment() {
    let shop = Shop::default();
    let (v, placed) = place(&shop, "bob", card());

    let cancelled = shop.orders.cancel(&placed.order.id).unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.payment.unwrap().status, PaymentStatus::Voided);
    assert_eq!(levels(&shop, &v), (10, 0));
    assert_eq!(
        entry_kinds(&shop, &v).last(),
        Some(&TransactionType::Return)
    );
}

#[test]
fn cancel_is_not_repeated() {
    let shop = Shop::default();
    let (v, placed) = place(&shop, "carol", card());
    let id = placed.order.id;

    shop.orders.cancel(&id).unwrap();
    let err = shop.orders.cancel(&id).unwrap_err();
    assert_eq!(
        err,
        CommerceError::InvalidStateTransition {
            from: OrderStatus::Cancelled,
            event: OrderEvent::Cancel,
        }
    );
    assert_eq!(levels(&shop, &v), (10, 0));

    let returns = shop
        .log
        .find_by_order(&id)
        .unwrap()
        .into_iter()
        .filter(|e| e.transaction_type == TransactionType::Return)
        .count();
    assert_eq!(returns, 1);
}

#[test]
fn shipped_orders_cannot_be_cancelled() {
    let shop = Shop::default();
    let (v, placed) = place(
        &shop,
        "dave",
        PaymentResult::captured(PaymentMethod::Card, "txn-4"),
    );
    let id = placed.order.id;

    shop.orders.ship(&id).unwrap();
    let err = shop.orders.cancel(&id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invariant);
    assert_eq!(
        err.to_string(),
        "Invalid order transition: cannot cancel from SHIPPED"
    );
    assert_eq!(shop.orders.order(&id).unwrap().order.status, OrderStatus::Shipped);
    assert_eq!(levels(&shop, &v), (7, 0));
}

#[test]
fn every_unlisted_transition_is_rejected() {
    let shop = Shop::default();
    let (_, placed) = place(&shop, "erin", card());
    let id = placed.order.id;

    for event in [OrderEvent::Ship, OrderEvent::Deliver] {
        assert!(matches!(
            shop.orders.apply(&id, event),
            Err(CommerceError::InvalidStateTransition { from: OrderStatus::Pending, .. })
        ));
    }
    shop.orders.mark_paid(&id).unwrap();
    assert!(shop.orders.mark_paid(&id).is_err());
    assert!(shop.orders.deliver(&id).is_err());
    assert_eq!(shop.orders.order(&id).unwrap().order.status, OrderStatus::Paid);
}

#[test]
fn unknown_orders_are_reported() {
    let shop = Shop::default();
    let missing = OrderId::new("ord_missing");

    assert_eq!(
        shop.orders.ship(&missing).unwrap_err(),
        CommerceError::OrderNotFound(missing.clone())
    );
    assert_eq!(
        shop.orders.payment(&missing).unwrap_err(),
        CommerceError::OrderNotFound(missing.clone())
    );
    assert_eq!(
        shop.orders.order(&missing).unwrap_err(),
        CommerceError::OrderNotFound(missing)
    );
}

#[test]
fn orders_are_listed_per_user_oldest_first() {
    let shop = Shop::default();
    let v = variant(&shop, "V1", 500, 10);
    let user = UserId::new("frank");

    let mut placed = Vec::new();
    for qty in 1..=3 {
        shop.carts.add_item(&user, &v, qty).unwrap();
        placed.push(
            shop.checkout
                .checkout(&user, "2 Side St", card(), None)
                .unwrap()
                .order
                .id,
        );
    }
    variant(&shop, "V2", 500, 10);
    shop.carts
        .add_item(&UserId::new("other"), &VariantId::new("V2"), 1)
        .unwrap();
    shop.checkout
        .checkout(&UserId::new("other"), "3 High St", card(), None)
        .unwrap();

    let listed: Vec<_> = shop
        .orders
        .orders_for_user(&user)
        .unwrap()
        .into_iter()
        .map(|view| view.order.id)
        .collect();
    assert_eq!(listed, placed);
    assert_eq!(levels(&shop, &v), (4, 0));
}

#[test]
fn payment_record_follows_the_order() {
    let shop = Shop::default();
    let (_, placed) = place(
        &shop,
        "gina",
        PaymentResult::captured(PaymentMethod::Other("voucher".into()), "txn-7"),
    );
    let payment = shop.orders.payment(&placed.order.id).unwrap().unwrap();
    assert_eq!(payment.order_id, placed.order.id);
    assert_eq!(payment.amount, usd(3600));
    assert_eq!(payment.transaction_id.as_deref(), Some("txn-7"));
    assert_eq!(payment.status, PaymentStatus::Captured);

    shop.orders.cancel(&placed.order.id).unwrap();
    let payment = shop.orders.payment(&placed.order.id).unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Refunded);
}
