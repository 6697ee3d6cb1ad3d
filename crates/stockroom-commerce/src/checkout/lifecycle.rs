//! Order lifecycle: status transitions and their stock side effects.

use std::sync::Arc;

use stockroom_db::{DbError, LockPolicy, Table};

use crate::checkout::{OrderEvent, OrderStatus, OrderView, Payment, ShopOrder, StockState};
use crate::error::CommerceError;
use crate::ids::{OrderId, UserId};
use crate::inventory::VariantLedger;

/// Stores orders and payments and drives orders through their states.
///
/// Row locks are always taken order first, then payment, then variant rows
/// (through the ledger).
#[derive(Debug)]
pub struct OrderService {
    orders: Table<OrderId, ShopOrder>,
    payments: Table<OrderId, Payment>,
    ledger: Arc<VariantLedger>,
}

impl OrderService {
    pub fn new(ledger: Arc<VariantLedger>, policy: LockPolicy) -> Self {
        Self {
            orders: Table::new("shop_orders", policy),
            payments: Table::new("payments", policy),
            ledger,
        }
    }

    /// Persist a new order and its payment.
    pub(crate) fn insert(
        &self,
        order: ShopOrder,
        payment: Option<Payment>,
    ) -> Result<OrderView, CommerceError> {
        // The payment goes in first so an order is never visible without it.
        let id = order.id.clone();
        if let Some(payment) = &payment {
            self.payments.insert(id.clone(), payment.clone())?;
        }
        self.orders.insert(id, order.clone())?;
        Ok(OrderView { order, payment })
    }

    /// Fetch an order with its payment.
    pub fn order(&self, id: &OrderId) -> Result<OrderView, CommerceError> {
        let order = self
            .orders
            .get(id)?
            .ok_or_else(|| CommerceError::OrderNotFound(id.clone()))?;
        let payment = self.payments.get(id)?;
        Ok(OrderView { order, payment })
    }

    /// A user's orders, oldest first.
    pub fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<OrderView>, CommerceError> {
        let mut orders: Vec<ShopOrder> = self
            .orders
            .values()?
            .into_iter()
            .filter(|o| &o.user_id == user_id)
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        orders
            .into_iter()
            .map(|order| -> Result<OrderView, CommerceError> {
                let payment = self.payments.get(&order.id)?;
                Ok(OrderView { order, payment })
            })
            .collect()
    }

    /// The payment for an order, if one was recorded.
    pub fn payment(&self, order_id: &OrderId) -> Result<Option<Payment>, CommerceError> {
        if !self.orders.contains(order_id)? {
            return Err(CommerceError::OrderNotFound(order_id.clone()));
        }
        Ok(self.payments.get(order_id)?)
    }

    /// `PENDING -> PAID`; captures the payment.
    pub fn mark_paid(&self, id: &OrderId) -> Result<OrderView, CommerceError> {
        self.apply(id, OrderEvent::Pay)
    }

    /// `PAID -> SHIPPED`.
    pub fn ship(&self, id: &OrderId) -> Result<OrderView, CommerceError> {
        self.apply(id, OrderEvent::Ship)
    }

    /// `SHIPPED -> DELIVERED`.
    pub fn deliver(&self, id: &OrderId) -> Result<OrderView, CommerceError> {
        self.apply(id, OrderEvent::Deliver)
    }

    /// `PENDING|PAID -> CANCELLED`; committed stock is returned and held
    /// stock released before the status changes.
    pub fn cancel(&self, id: &OrderId) -> Result<OrderView, CommerceError> {
        self.apply(id, OrderEvent::Cancel)
    }

    /// Apply an event to a stored order.
    ///
    /// The payment row is updated while the order row is still locked, so
    /// a payment always reflects the last transition of its order.
    pub fn apply(&self, id: &OrderId, event: OrderEvent) -> Result<OrderView, CommerceError> {
        // Line stock states are written back even when unwinding stops
        // part way, so a retried cancel never returns the same units twice.
        let (order, payment, unwound) = self
            .orders
            .update_blocking(id, |order| -> Result<_, CommerceError> {
                let to = order.status.transition(event)?;
                let unwound = if to == OrderStatus::Cancelled {
                    unwind_stock(&self.ledger, order, "order cancelled")
                } else {
                    Ok(())
                };
                if unwound.is_err() {
                    return Ok((order.clone(), None, unwound));
                }
                order.apply(event)?;
                let payment = self.follow_payment(&order.id, order.status)?;
                Ok((order.clone(), payment, unwound))
            })
            .map_err(|e| match e {
                CommerceError::Storage(DbError::NotFound { table, .. })
                    if table == self.orders.name() =>
                {
                    CommerceError::OrderNotFound(id.clone())
                }
                other => other,
            })
            .inspect_err(|e| e.trace("order_transition"))?;

        if let Err(e) = unwound {
            e.trace("order_cancel");
            return Err(e);
        }

        tracing::info!(
            order_id = %order.id,
            event = %event,
            status = %order.status,
            "order transitioned"
        );
        Ok(OrderView { order, payment })
    }

    /// Move the payment to match `status`. Callers hold the order row lock.
    fn follow_payment(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
    ) -> Result<Option<Payment>, CommerceError> {
        let result = self
            .payments
            .update_blocking(order_id, |payment| -> Result<Payment, CommerceError> {
                payment.status = payment.status.following(status);
                Ok(payment.clone())
            });
        match result {
            Ok(payment) => Ok(Some(payment)),
            Err(CommerceError::Storage(DbError::NotFound { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Give back every unit an order still holds: committed lines are
/// returned to stock, reserved lines released. Lines are processed last
/// to first and marked as they complete.
pub(crate) fn unwind_stock(
    ledger: &VariantLedger,
    order: &mut ShopOrder,
    note: &str,
) -> Result<(), CommerceError> {
    let order_id = order.id.clone();
    for item in order.items.iter_mut().rev() {
        match item.stock_state {
            StockState::Committed => {
                ledger.return_stock(&item.variant_id, item.quantity, &order_id)?;
                item.stock_state = StockState::Returned;
            }
            StockState::Reserved => {
                ledger.release_for(&item.variant_id, item.quantity, Some(&order_id), Some(note))?;
                item.stock_state = StockState::Released;
            }
            StockState::Released | StockState::Returned => {}
        }
    }
    tracing::warn!(order_id = %order_id, note, "order stock unwound");
    Ok(())
}
