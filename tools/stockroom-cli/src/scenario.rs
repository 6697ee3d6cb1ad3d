//! Scripted scenarios replayed against a fresh shop.
//!
//! A scenario seeds variants, then runs steps in order. Each step may
//! declare `expect = "fail"`; the run reports every step whose outcome
//! differs from its expectation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stockroom_commerce::prelude::*;

/// A scenario file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub variants: Vec<VariantSeed>,
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
}

impl Scenario {
    /// Parse scenario text; `path` decides between JSON and TOML.
    pub fn parse(path: &str, content: &str) -> Result<Self> {
        if path.ends_with(".json") {
            serde_json::from_str(content)
                .with_context(|| format!("Failed to parse JSON scenario: {}", path))
        } else {
            toml::from_str(content)
                .with_context(|| format!("Failed to parse TOML scenario: {}", path))
        }
    }
}

/// A variant registered before the first step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantSeed {
    pub id: String,
    pub sku: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Price in minor units of the configured currency.
    pub price_cents: i64,
    #[serde(default)]
    pub cost_cents: Option<i64>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// One step and its expected outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    #[serde(flatten)]
    pub action: Action,
    #[serde(default)]
    pub expect: Expect,
}

/// Expected outcome of a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expect {
    #[default]
    Ok,
    Fail,
}

/// Payment outcome reported for a scripted checkout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Captured,
    #[default]
    Pending,
    Declined,
}

/// What a step does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    AddItem {
        user: String,
        variant: String,
        quantity: i64,
    },
    UpdateQuantity {
        user: String,
        variant: String,
        quantity: i64,
    },
    RemoveItem {
        user: String,
        variant: String,
    },
    ClearCart {
        user: String,
    },
    Checkout {
        user: String,
        #[serde(default)]
        address: String,
        #[serde(default)]
        payment: PaymentOutcome,
        /// Restrict the checkout to the lines of these variants.
        #[serde(default)]
        variants: Option<Vec<String>>,
        /// Name later steps use to refer to the order.
        #[serde(default)]
        label: Option<String>,
    },
    Reserve {
        variant: String,
        quantity: u32,
    },
    Release {
        variant: String,
        quantity: u32,
    },
    AdjustStock {
        variant: String,
        delta: i64,
        #[serde(default)]
        note: String,
    },
    SetPrice {
        variant: String,
        price_cents: i64,
    },
    SetActive {
        variant: String,
        active: bool,
    },
    Pay {
        order: String,
    },
    Ship {
        order: String,
    },
    Deliver {
        order: String,
    },
    Cancel {
        order: String,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddItem { .. } => "add_item",
            Action::UpdateQuantity { .. } => "update_quantity",
            Action::RemoveItem { .. } => "remove_item",
            Action::ClearCart { .. } => "clear_cart",
            Action::Checkout { .. } => "checkout",
            Action::Reserve { .. } => "reserve",
            Action::Release { .. } => "release",
            Action::AdjustStock { .. } => "adjust_stock",
            Action::SetPrice { .. } => "set_price",
            Action::SetActive { .. } => "set_active",
            Action::Pay { .. } => "pay",
            Action::Ship { .. } => "ship",
            Action::Deliver { .. } => "deliver",
            Action::Cancel { .. } => "cancel",
        }
    }
}

/// Result of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub action: &'static str,
    pub expected: Expect,
    pub ok: bool,
    pub detail: String,
}

impl StepOutcome {
    /// Whether the outcome is the one the script declared.
    pub fn matched(&self) -> bool {
        self.ok == (self.expected == Expect::Ok)
    }
}

/// Final counters of one variant.
#[derive(Debug, Clone, Serialize)]
pub struct VariantReport {
    pub id: VariantId,
    pub sku: String,
    pub stock: u32,
    pub reserved: u32,
    pub available: u32,
    pub ledger_entries: usize,
    pub balanced: bool,
}

/// Final state of one scripted order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub label: String,
    pub id: OrderId,
    pub status: OrderStatus,
    pub total: Money,
    pub payment: Option<PaymentStatus>,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: Option<String>,
    pub steps: Vec<StepOutcome>,
    pub variants: Vec<VariantReport>,
    pub orders: Vec<OrderSummary>,
}

impl ScenarioReport {
    /// Steps whose outcome differed from their expectation.
    pub fn mismatches(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| !s.matched())
    }

    /// Variants whose ledger does not reproduce their counters.
    pub fn unbalanced(&self) -> impl Iterator<Item = &VariantReport> {
        self.variants.iter().filter(|v| !v.balanced)
    }
}

/// Replays scenarios against its own shop.
pub struct ScenarioRunner {
    shop: Shop,
    labels: Vec<(String, OrderId)>,
    by_label: HashMap<String, OrderId>,
}

impl ScenarioRunner {
    pub fn new(config: CommerceConfig) -> Self {
        Self {
            shop: Shop::new(config),
            labels: Vec::new(),
            by_label: HashMap::new(),
        }
    }

    /// Seed variants, run every step, and collect the final state.
    ///
    /// Seeding errors abort the run; step errors are recorded as outcomes.
    pub fn run(
        &mut self,
        scenario: &Scenario,
        fail_fast: bool,
        mut on_step: impl FnMut(&StepOutcome),
    ) -> Result<ScenarioReport> {
        self.seed(&scenario.variants)?;

        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            let (ok, detail) = match self.apply(&step.action) {
                Ok(detail) => (true, detail),
                Err(e) => (false, e.to_string()),
            };
            let outcome = StepOutcome {
                index: index + 1,
                action: step.action.name(),
                expected: step.expect,
                ok,
                detail,
            };
            on_step(&outcome);
            let matched = outcome.matched();
            steps.push(outcome);
            if fail_fast && !matched {
                break;
            }
        }

        Ok(ScenarioReport {
            name: scenario.name.clone(),
            steps,
            variants: self.variant_reports()?,
            orders: self.order_summaries()?,
        })
    }

    fn seed(&mut self, variants: &[VariantSeed]) -> Result<()> {
        let currency = self.shop.config.currency;
        for def in variants {
            let mut new = NewVariant::new(
                def.sku.clone(),
                def.name.clone().unwrap_or_else(|| def.sku.clone()),
                Money::new(def.price_cents, currency),
            )
            .with_id(def.id.as_str())
            .with_stock(def.stock);
            if let Some(cost) = def.cost_cents {
                new = new.with_cost_price(Money::new(cost, currency));
            }
            if !def.active {
                new = new.inactive();
            }
            self.shop
                .ledger
                .register_variant(new)
                .with_context(|| format!("Failed to register variant {}", def.id))?;
        }
        Ok(())
    }

    /// Run one action, returning a one-line description of its effect.
    pub fn apply(&mut self, action: &Action) -> Result<String, CommerceError> {
        let shop = &self.shop;
        match action {
            Action::AddItem {
                user,
                variant,
                quantity,
            } => {
                let view = shop
                    .carts
                    .add_item(&UserId::new(user.as_str()), &VariantId::new(variant.as_str()), *quantity)?;
                Ok(cart_detail(&view))
            }
            Action::UpdateQuantity {
                user,
                variant,
                quantity,
            } => {
                let user = UserId::new(user.as_str());
                let item = self.line_id(&user, variant)?;
                let view = shop.carts.update_quantity(&user, &item, *quantity)?;
                Ok(cart_detail(&view))
            }
            Action::RemoveItem { user, variant } => {
                let user = UserId::new(user.as_str());
                let item = self.line_id(&user, variant)?;
                let view = shop.carts.remove_item(&user, &item)?;
                Ok(cart_detail(&view))
            }
            Action::ClearCart { user } => {
                let view = shop.carts.clear(&UserId::new(user.as_str()))?;
                Ok(cart_detail(&view))
            }
            Action::Checkout {
                user,
                address,
                payment,
                variants,
                label,
            } => {
                let user = UserId::new(user.as_str());
                let selected = match variants {
                    Some(variants) => Some(
                        variants
                            .iter()
                            .map(|v| self.line_id(&user, v))
                            .collect::<Result<Vec<_>, _>>()?,
                    ),
                    None => None,
                };
                let result = match payment {
                    PaymentOutcome::Captured => PaymentResult::captured(
                        PaymentMethod::Card,
                        format!("sim-{}", self.labels.len() + 1),
                    ),
                    PaymentOutcome::Pending => PaymentResult::pending(PaymentMethod::Card),
                    PaymentOutcome::Declined => PaymentResult::declined(PaymentMethod::Card),
                };

                let view = shop
                    .checkout
                    .checkout(&user, address, result, selected.as_deref())?;
                let label = label
                    .clone()
                    .unwrap_or_else(|| format!("order-{}", self.labels.len() + 1));
                let detail = format!(
                    "{} -> {} {} total {}",
                    label,
                    view.order.id,
                    view.order.status,
                    view.order.total.display()
                );
                self.by_label.insert(label.clone(), view.order.id.clone());
                self.labels.push((label, view.order.id));
                Ok(detail)
            }
            Action::Reserve { variant, quantity } => {
                let entry = shop
                    .ledger
                    .reserve(&VariantId::new(variant.as_str()), *quantity)?;
                Ok(entry_detail(&entry))
            }
            Action::Release { variant, quantity } => {
                let entry = shop
                    .ledger
                    .release(&VariantId::new(variant.as_str()), *quantity)?;
                Ok(entry
                    .map(|e| entry_detail(&e))
                    .unwrap_or_else(|| "nothing reserved".to_string()))
            }
            Action::AdjustStock {
                variant,
                delta,
                note,
            } => {
                let entry = shop
                    .ledger
                    .adjust_stock(&VariantId::new(variant.as_str()), *delta, note)?;
                Ok(entry_detail(&entry))
            }
            Action::SetPrice {
                variant,
                price_cents,
            } => {
                let v = shop.ledger.set_price(
                    &VariantId::new(variant.as_str()),
                    Money::new(*price_cents, shop.config.currency),
                )?;
                Ok(format!("{} now {}", v.id, v.price.display()))
            }
            Action::SetActive { variant, active } => {
                let v = shop
                    .ledger
                    .set_active(&VariantId::new(variant.as_str()), *active)?;
                Ok(format!("{} active={}", v.id, v.is_active))
            }
            Action::Pay { order } => Ok(order_detail(shop.orders.mark_paid(&self.order_id(order))?)),
            Action::Ship { order } => Ok(order_detail(shop.orders.ship(&self.order_id(order))?)),
            Action::Deliver { order } => {
                Ok(order_detail(shop.orders.deliver(&self.order_id(order))?))
            }
            Action::Cancel { order } => Ok(order_detail(shop.orders.cancel(&self.order_id(order))?)),
        }
    }

    /// Counters and reconciliation of every variant, by id.
    pub fn variant_reports(&self) -> Result<Vec<VariantReport>, CommerceError> {
        self.shop
            .ledger
            .variant_ids()?
            .iter()
            .map(|id| -> Result<VariantReport, CommerceError> {
                let variant = self.shop.ledger.get(id)?;
                let reconciliation = self.shop.ledger.reconcile(id)?;
                Ok(VariantReport {
                    id: variant.id.clone(),
                    sku: variant.sku.clone(),
                    stock: variant.stock,
                    reserved: variant.reserved,
                    available: variant.available(),
                    ledger_entries: reconciliation.entries,
                    balanced: reconciliation.is_balanced(),
                })
            })
            .collect()
    }

    fn order_summaries(&self) -> Result<Vec<OrderSummary>, CommerceError> {
        self.labels
            .iter()
            .map(|(label, id)| -> Result<OrderSummary, CommerceError> {
                let view = self.shop.orders.order(id)?;
                Ok(OrderSummary {
                    label: label.clone(),
                    id: id.clone(),
                    status: view.order.status,
                    total: view.order.total,
                    payment: view.payment.map(|p| p.status),
                })
            })
            .collect()
    }

    fn line_id(&self, user: &UserId, variant: &str) -> Result<CartItemId, CommerceError> {
        let view = self.shop.carts.get_with_items(user)?;
        view.line_for(&VariantId::new(variant))
            .map(|line| line.item_id.clone())
            .ok_or_else(|| CommerceError::ItemNotInCart(CartItemId::new(variant)))
    }

    fn order_id(&self, label: &str) -> OrderId {
        self.by_label
            .get(label)
            .cloned()
            .unwrap_or_else(|| OrderId::new(label))
    }
}

fn cart_detail(view: &CartView) -> String {
    format!(
        "{}: {} unit(s), subtotal {}",
        view.user_id,
        view.item_count,
        view.subtotal.display()
    )
}

fn entry_detail(entry: &InventoryTransaction) -> String {
    format!(
        "{} {} {} x{}",
        entry.id, entry.variant_id, entry.transaction_type, entry.quantity
    )
}

fn order_detail(view: OrderView) -> String {
    let payment = view
        .payment
        .map(|p| p.status.to_string())
        .unwrap_or_else(|| "none".to_string());
    format!("{} {} payment {}", view.order.id, view.order.status, payment)
}
