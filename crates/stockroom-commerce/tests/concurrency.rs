//! Concurrent reservations and checkouts against shared variants.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use common::*;
use stockroom_commerce::prelude::*;

#[test]
fn concurrent_reserves_never_oversell() {
    let shop = Shop::default();
    let v = variant(&shop, "HOT", 1000, 100);
    let granted = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let ledger = shop.ledger.clone();
            let granted = granted.clone();
            let v = v.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    match ledger.reserve(&v, 1) {
                        Ok(_) => {
                            granted.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => assert_eq!(e.kind(), ErrorKind::Admission),
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let granted = granted.load(Ordering::SeqCst);
    let (stock, reserved) = levels(&shop, &v);
    assert!(granted <= 100);
    assert_eq!(stock, 100);
    assert_eq!(reserved, granted);
    assert_balanced(&shop);
}

#[test]
fn concurrent_checkouts_sell_each_unit_once() {
    let shop = Shop::default();
    let v = variant(&shop, "HOT", 1000, 40);
    let sold = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let shop = shop.clone();
            let sold = sold.clone();
            let v = v.clone();
            thread::spawn(move || {
                let user = UserId::new(format!("shopper-{worker}"));
                for _ in 0..10 {
                    shop.carts.add_item(&user, &v, 1).unwrap();
                    match shop.checkout.checkout(&user, "1 Main St", card(), None) {
                        Ok(_) => {
                            sold.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => {
                            assert_eq!(e.kind(), ErrorKind::Admission);
                            shop.carts.clear(&user).unwrap();
                        }
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let sold = sold.load(Ordering::SeqCst);
    let (stock, reserved) = levels(&shop, &v);
    assert!(sold <= 40);
    assert_eq!(stock + sold, 40);
    assert_eq!(reserved, 0);
    assert_balanced(&shop);
}

#[test]
fn overlapping_checkouts_do_not_deadlock() {
    let shop = Shop::default();
    let a = variant(&shop, "A", 100, 1000);
    let b = variant(&shop, "B", 100, 1000);

    let handles: Vec<_> = (0..6)
        .map(|worker| {
            let shop = shop.clone();
            // Half the shoppers fill their carts in the opposite order.
            let (first, second) = if worker % 2 == 0 {
                (a.clone(), b.clone())
            } else {
                (b.clone(), a.clone())
            };
            thread::spawn(move || {
                let user = UserId::new(format!("shopper-{worker}"));
                let mut placed = 0u32;
                for _ in 0..25 {
                    shop.carts.add_item(&user, &first, 1).unwrap();
                    shop.carts.add_item(&user, &second, 2).unwrap();
                    match shop.checkout.checkout(&user, "1 Main St", card(), None) {
                        Ok(_) => placed += 1,
                        Err(_) => {
                            shop.carts.clear(&user).unwrap();
                        }
                    }
                }
                placed
            })
        })
        .collect();

    let placed: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let a_sold = 1000 - levels(&shop, &a).0;
    let b_sold = 1000 - levels(&shop, &b).0;

    // Each order took one unit of the first variant and two of the second,
    // whichever that was, so both variants together lost 3 per order.
    assert_eq!(a_sold + b_sold, placed * 3);
    assert_eq!(levels(&shop, &a).1, 0);
    assert_eq!(levels(&shop, &b).1, 0);
    assert_balanced(&shop);
}

#[test]
fn distinct_variants_proceed_independently() {
    let shop = Shop::default();
    let ids: Vec<_> = (0..4)
        .map(|i| variant(&shop, &format!("V{i}"), 100, 50))
        .collect();

    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let ledger = shop.ledger.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    ledger.reserve(&id, 1).unwrap();
                }
                for _ in 0..50 {
                    ledger.commit(&id, 1, &OrderId::new("bulk")).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for id in &ids {
        assert_eq!(levels(&shop, id), (0, 0));
    }
    assert_eq!(
        shop.log
            .find_by_order(&OrderId::new("bulk"))
            .unwrap()
            .len(),
        200
    );
    assert_balanced(&shop);
}

#[test]
fn racing_pay_and_cancel_keep_payment_in_step() {
    let shop = Shop::default();
    let v = variant(&shop, "HOT", 1000, 300);
    let user = UserId::new("racer");

    for _ in 0..300 {
        shop.carts.add_item(&user, &v, 1).unwrap();
        let order_id = shop
            .checkout
            .checkout(&user, "1 Main St", card(), None)
            .unwrap()
            .order
            .id;

        let barrier = Barrier::new(2);
        let (paid, cancelled) = thread::scope(|s| {
            let pay = s.spawn(|| {
                barrier.wait();
                shop.orders.mark_paid(&order_id).is_ok()
            });
            let cancel = s.spawn(|| {
                barrier.wait();
                shop.orders.cancel(&order_id).is_ok()
            });
            (pay.join().unwrap(), cancel.join().unwrap())
        });

        // Cancel always lands: either before pay, or after it from PAID.
        assert!(cancelled);
        let view = shop.orders.order(&order_id).unwrap();
        assert_eq!(view.order.status, OrderStatus::Cancelled);
        let expected = if paid {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::Voided
        };
        assert_eq!(view.payment.unwrap().status, expected);
    }

    assert_eq!(levels(&shop, &v), (300, 0));
    assert_balanced(&shop);
}
