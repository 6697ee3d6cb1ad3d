//! Turning cart lines into an order.

use std::sync::Arc;

use chrono::Utc;

use crate::cart::{CartItem, CartService};
use crate::checkout::lifecycle::unwind_stock;
use crate::checkout::{
    OrderItem, OrderService, OrderStatus, OrderView, Payment, PaymentResult, PaymentStatus,
    ShopOrder, StockState,
};
use crate::config::CommerceConfig;
use crate::error::CommerceError;
use crate::ids::{CartItemId, OrderId, OrderItemId, UserId, VariantId};
use crate::inventory::VariantLedger;
use crate::money::Money;

/// Runs checkout as a saga over the ledger, carts and orders.
///
/// Reservations are taken in ascending [`VariantId`] order so that two
/// checkouts touching the same variants always contend in the same order.
/// Any failure before the order exists releases every reservation already
/// taken, in reverse order, and leaves the cart untouched.
#[derive(Debug)]
pub struct CheckoutCoordinator {
    ledger: Arc<VariantLedger>,
    carts: Arc<CartService>,
    orders: Arc<OrderService>,
    config: CommerceConfig,
}

impl CheckoutCoordinator {
    pub fn new(
        ledger: Arc<VariantLedger>,
        carts: Arc<CartService>,
        orders: Arc<OrderService>,
        config: CommerceConfig,
    ) -> Self {
        Self {
            ledger,
            carts,
            orders,
            config,
        }
    }

    /// Check out the user's cart, or only `selected` lines of it.
    ///
    /// On success the checked-out lines leave the cart and the order is
    /// `PENDING`, or `PAID` when `payment` is already captured. A declined
    /// payment still creates the order, which is cancelled at once with its
    /// stock returned; the cart keeps its lines.
    pub fn checkout(
        &self,
        user_id: &UserId,
        shipping_address: &str,
        payment: PaymentResult,
        selected: Option<&[CartItemId]>,
    ) -> Result<OrderView, CommerceError> {
        let result = self.run(user_id, shipping_address, payment, selected);
        if let Err(e) = &result {
            e.trace("checkout");
        }
        result
    }

    fn run(
        &self,
        user_id: &UserId,
        shipping_address: &str,
        payment: PaymentResult,
        selected: Option<&[CartItemId]>,
    ) -> Result<OrderView, CommerceError> {
        let mut lines = self.carts.snapshot_lines(user_id, selected)?;
        lines.sort_by(|a, b| a.variant_id.cmp(&b.variant_id));
        let line_ids: Vec<CartItemId> = lines.iter().map(|l| l.id.clone()).collect();

        let items = freeze_items(&lines);
        let total = order_total(&items, &self.config)?;
        let order = new_order(OrderId::generate(), user_id, shipping_address, items, total);

        self.reserve_all(&order.id, &order.items)?;

        let payment = Payment::new(order.id.clone(), total, payment);
        self.place(order, payment, &line_ids)
    }

    /// Commit a fully reserved order, store it, settle its payment and drop
    /// the checked-out lines from the cart.
    fn place(
        &self,
        mut order: ShopOrder,
        payment: Payment,
        line_ids: &[CartItemId],
    ) -> Result<OrderView, CommerceError> {
        if let Err(e) = self.commit_all(&mut order) {
            return Err(self.abandon(order, payment, e));
        }

        let order_id = order.id.clone();
        let user_id = order.user_id.clone();
        let total = order.total;
        let declined = matches!(
            payment.status,
            PaymentStatus::Declined | PaymentStatus::Voided | PaymentStatus::Refunded
        );
        let captured = payment.status == PaymentStatus::Captured;
        let mut view = self.orders.insert(order, Some(payment))?;
        tracing::info!(
            order_id = %order_id,
            user_id = %user_id,
            lines = line_ids.len(),
            total = %total,
            "order created"
        );

        if declined {
            tracing::warn!(order_id = %order_id, "payment declined, cancelling order");
            return self.orders.cancel(&order_id);
        }
        if captured {
            view = self.orders.mark_paid(&order_id)?;
        }

        let removed = self.carts.remove_lines(&user_id, line_ids)?;
        tracing::debug!(
            user_id = %user_id,
            removed,
            "checked-out lines removed from cart"
        );
        Ok(view)
    }

    /// Reserve every line; on the first refusal release what was taken.
    fn reserve_all(&self, order_id: &OrderId, items: &[OrderItem]) -> Result<(), CommerceError> {
        let mut taken: Vec<(&VariantId, u32)> = Vec::with_capacity(items.len());
        for item in items {
            match self.ledger.reserve(&item.variant_id, item.quantity) {
                Ok(_) => taken.push((&item.variant_id, item.quantity)),
                Err(e) => {
                    tracing::warn!(
                        order_id = %order_id,
                        variant_id = %item.variant_id,
                        released = taken.len(),
                        "reservation refused, rolling back checkout"
                    );
                    for (variant_id, quantity) in taken.into_iter().rev() {
                        if let Err(release_err) =
                            self.ledger
                                .release_for(variant_id, quantity, None, Some("checkout aborted"))
                        {
                            release_err.trace("checkout_rollback");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn commit_all(&self, order: &mut ShopOrder) -> Result<(), CommerceError> {
        for item in order.items.iter_mut() {
            self.ledger
                .commit(&item.variant_id, item.quantity, &order.id)?;
            item.stock_state = StockState::Committed;
        }
        Ok(())
    }

    /// Unwind a half-committed order and store it.
    ///
    /// When every line is given back the order is kept as `CANCELLED` for
    /// audit and `cause` is returned. Otherwise it stays `PENDING` with its
    /// line progress, so a later cancel finishes the unwind.
    fn abandon(
        &self,
        mut order: ShopOrder,
        mut payment: Payment,
        cause: CommerceError,
    ) -> CommerceError {
        cause.trace("checkout_commit");
        let error = match unwind_stock(&self.ledger, &mut order, "checkout aborted") {
            Ok(()) => {
                order.status = OrderStatus::Cancelled;
                payment.status = payment.status.following(OrderStatus::Cancelled);
                cause
            }
            Err(e) => {
                e.trace("checkout_unwind");
                let remaining = order
                    .items
                    .iter()
                    .filter(|i| matches!(i.stock_state, StockState::Reserved | StockState::Committed))
                    .count();
                CommerceError::UnwindIncomplete {
                    order_id: order.id.clone(),
                    remaining,
                }
            }
        };
        order.updated_at = Utc::now();
        if let Err(e) = self.orders.insert(order, Some(payment)) {
            e.trace("checkout_unwind");
        }
        error
    }
}

fn new_order(
    id: OrderId,
    user_id: &UserId,
    shipping_address: &str,
    items: Vec<OrderItem>,
    total: Money,
) -> ShopOrder {
    let now = Utc::now();
    ShopOrder {
        id,
        user_id: user_id.clone(),
        status: OrderStatus::Pending,
        items,
        total,
        shipping_address: shipping_address.to_string(),
        created_at: now,
        updated_at: now,
    }
}

fn freeze_items(lines: &[CartItem]) -> Vec<OrderItem> {
    lines
        .iter()
        .map(|line| OrderItem {
            id: OrderItemId::generate(),
            variant_id: line.variant_id.clone(),
            quantity: line.quantity,
            unit_price: line.price_snapshot,
            stock_state: StockState::Reserved,
        })
        .collect()
}

fn order_total(items: &[OrderItem], config: &CommerceConfig) -> Result<Money, CommerceError> {
    let mut total = Money::zero(config.currency);
    for item in items {
        let line = item.line_total()?;
        total = total.try_add(&line).ok_or(if line.currency == total.currency {
            CommerceError::Overflow
        } else {
            CommerceError::CurrencyMismatch {
                expected: total.currency,
                got: line.currency,
            }
        })?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NewVariant;
    use crate::checkout::PaymentMethod;
    use crate::inventory::TransactionType;
    use crate::money::Currency;
    use crate::Shop;

    fn stocked_shop(variants: &[&str]) -> Shop {
        let shop = Shop::default();
        for id in variants {
            shop.ledger
                .register_variant(
                    NewVariant::new(format!("SKU-{id}"), *id, Money::new(1000, Currency::USD))
                        .with_id(*id)
                        .with_stock(5),
                )
                .unwrap();
        }
        shop
    }

    /// Snapshot the user's cart and reserve it the way `checkout` does.
    fn reserved_order(shop: &Shop, user: &UserId) -> (ShopOrder, Vec<CartItemId>) {
        let mut lines = shop.carts.snapshot_lines(user, None).unwrap();
        lines.sort_by(|a, b| a.variant_id.cmp(&b.variant_id));
        let line_ids = lines.iter().map(|l| l.id.clone()).collect();
        let items = freeze_items(&lines);
        let total = order_total(&items, &shop.config).unwrap();
        let order = new_order(OrderId::generate(), user, "1 Test Lane", items, total);
        shop.checkout.reserve_all(&order.id, &order.items).unwrap();
        (order, line_ids)
    }

    #[test]
    fn test_commit_failure_unwinds_and_cancels() {
        let shop = stocked_shop(&["V1", "V2"]);
        let user = UserId::new("U1");
        let (v1, v2) = (VariantId::new("V1"), VariantId::new("V2"));
        shop.carts.add_item(&user, &v1, 2).unwrap();
        shop.carts.add_item(&user, &v2, 2).unwrap();

        let (order, line_ids) = reserved_order(&shop, &user);
        let order_id = order.id.clone();
        // The V2 reservation disappears before the order commits it.
        shop.ledger.release(&v2, 2).unwrap();

        let card = PaymentResult::pending(PaymentMethod::Card);
        let payment = Payment::new(order_id.clone(), order.total, card);
        let err = shop.checkout.place(order, payment, &line_ids).unwrap_err();
        assert_eq!(
            err,
            CommerceError::ReservationUnderflow {
                variant_id: v2.clone(),
                reserved: 0,
                requested: 2,
            }
        );

        for id in [&v1, &v2] {
            let v = shop.ledger.get(id).unwrap();
            assert_eq!((v.stock, v.reserved), (5, 0));
            assert!(shop.ledger.reconcile(id).unwrap().is_balanced());
        }

        let kinds: Vec<TransactionType> = shop
            .log
            .find_by_order(&order_id)
            .unwrap()
            .into_iter()
            .map(|e| e.transaction_type)
            .collect();
        assert_eq!(kinds, vec![TransactionType::Return, TransactionType::Sale]);

        let stored = shop.orders.order(&order_id).unwrap();
        assert_eq!(stored.order.status, OrderStatus::Cancelled);
        assert_eq!(stored.payment.unwrap().status, PaymentStatus::Voided);
        assert_eq!(shop.carts.item_count(&user).unwrap(), 4);
    }

    #[test]
    fn test_incomplete_unwind_leaves_order_cancellable() {
        let shop = stocked_shop(&["V1"]);
        let v1 = VariantId::new("V1");
        let order_id = OrderId::generate();
        shop.ledger.reserve(&v1, 2).unwrap();
        shop.ledger.commit(&v1, 2, &order_id).unwrap();

        let mut gone = item("GONE", 1, 1000, Currency::USD);
        gone.stock_state = StockState::Reserved;
        let mut sold = item("V1", 2, 1000, Currency::USD);
        sold.stock_state = StockState::Committed;
        let items = vec![gone, sold];
        let total = Money::new(3000, Currency::USD);
        let order = new_order(order_id.clone(), &UserId::new("U1"), "1 Test Lane", items, total);
        let card = PaymentResult::pending(PaymentMethod::Card);
        let payment = Payment::new(order_id.clone(), total, card);

        let err = shop.checkout.abandon(order, payment, CommerceError::Overflow);
        assert_eq!(
            err,
            CommerceError::UnwindIncomplete {
                order_id: order_id.clone(),
                remaining: 1,
            }
        );

        let v = shop.ledger.get(&v1).unwrap();
        assert_eq!((v.stock, v.reserved), (5, 0));

        let stored = shop.orders.order(&order_id).unwrap();
        assert_eq!(stored.order.status, OrderStatus::Pending);
        let states: Vec<StockState> = stored.order.items.iter().map(|i| i.stock_state).collect();
        assert_eq!(states, vec![StockState::Reserved, StockState::Returned]);
        assert_eq!(stored.payment.unwrap().status, PaymentStatus::Pending);
    }

    fn item(variant: &str, quantity: u32, cents: i64, currency: Currency) -> OrderItem {
        OrderItem {
            id: OrderItemId::generate(),
            variant_id: VariantId::new(variant),
            quantity,
            unit_price: Money::new(cents, currency),
            stock_state: StockState::Reserved,
        }
    }

    #[test]
    fn test_order_total() {
        let items = [
            item("V1", 2, 1200, Currency::USD),
            item("V2", 1, 2500, Currency::USD),
        ];
        let total = order_total(&items, &CommerceConfig::default()).unwrap();
        assert_eq!(total, Money::new(4900, Currency::USD));
    }

    #[test]
    fn test_order_total_rejects_mixed_currency() {
        let items = [item("V1", 1, 100, Currency::EUR)];
        assert!(matches!(
            order_total(&items, &CommerceConfig::default()),
            Err(CommerceError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_order_total_overflow() {
        let items = [
            item("V1", 1, i64::MAX, Currency::USD),
            item("V2", 1, 1, Currency::USD),
        ];
        assert_eq!(
            order_total(&items, &CommerceConfig::default()),
            Err(CommerceError::Overflow)
        );
    }
}
