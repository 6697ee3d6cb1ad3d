//! Race concurrent checkouts against a single variant.

use std::time::Instant;

use anyhow::{bail, Context as _, Result};
use indicatif::ProgressBar;
use serde::Serialize;
use stockroom_commerce::prelude::*;

use super::StressArgs;
use crate::context::Context;

#[derive(Debug, Default, Clone, Copy, Serialize)]
struct ShopperTally {
    orders: u64,
    units: u64,
    refused: u64,
    failed: u64,
}

impl ShopperTally {
    fn merge(&mut self, other: ShopperTally) {
        self.orders += other.orders;
        self.units += other.units;
        self.refused += other.refused;
        self.failed += other.failed;
    }
}

#[derive(Debug, Serialize)]
struct StressReport {
    workers: usize,
    attempts: usize,
    quantity: u32,
    opening_stock: u32,
    final_stock: u32,
    final_reserved: u32,
    ledger_entries: usize,
    balanced: bool,
    elapsed_ms: u64,
    #[serde(flatten)]
    tally: ShopperTally,
}

/// Run the stress command.
pub async fn run(args: StressArgs, ctx: &Context) -> Result<()> {
    if args.quantity == 0 {
        bail!("--quantity must be at least 1");
    }

    let shop = Shop::new(ctx.config.commerce.clone());
    let variant = shop.ledger.register_variant(
        NewVariant::new(
            "STRESS-1",
            "Contested variant",
            Money::new(1000, ctx.config.commerce.currency),
        )
        .with_stock(args.stock),
    )?;

    ctx.output.header("Stress checkout");
    ctx.output.kv("stock", &args.stock.to_string());
    ctx.output.kv("workers", &args.workers.to_string());
    ctx.output.kv("attempts", &args.attempts.to_string());
    ctx.output.kv("quantity", &args.quantity.to_string());

    let progress = ctx
        .output
        .progress((args.workers * args.attempts) as u64, "checking out");
    let started = Instant::now();

    let mut handles = Vec::with_capacity(args.workers);
    for worker in 0..args.workers {
        let shop = shop.clone();
        let variant_id = variant.id.clone();
        let progress = progress.clone();
        let attempts = args.attempts;
        let quantity = args.quantity;
        handles.push(tokio::task::spawn_blocking(move || {
            shopper(&shop, worker, &variant_id, attempts, quantity, &progress)
        }));
    }

    let mut tally = ShopperTally::default();
    for handle in handles {
        tally.merge(handle.await.context("shopper task panicked")?);
    }
    progress.finish_with_message("done");

    let after = shop.ledger.get(&variant.id)?;
    let reconciliation = shop.ledger.reconcile(&variant.id)?;
    let report = StressReport {
        workers: args.workers,
        attempts: args.attempts,
        quantity: args.quantity,
        opening_stock: args.stock,
        final_stock: after.stock,
        final_reserved: after.reserved,
        ledger_entries: reconciliation.entries,
        balanced: reconciliation.is_balanced(),
        elapsed_ms: started.elapsed().as_millis() as u64,
        tally,
    };
    tracing::info!(
        orders = tally.orders,
        units = tally.units,
        refused = tally.refused,
        failed = tally.failed,
        elapsed_ms = report.elapsed_ms,
        "stress run finished"
    );

    if ctx.output.is_json() {
        ctx.output.json(&report);
    } else {
        ctx.output.header("Result");
        ctx.output.kv("orders", &tally.orders.to_string());
        ctx.output.kv("units sold", &tally.units.to_string());
        ctx.output.kv("refused", &tally.refused.to_string());
        ctx.output.kv("other failures", &tally.failed.to_string());
        ctx.output.kv("final stock", &after.stock.to_string());
        ctx.output.kv("final reserved", &after.reserved.to_string());
        ctx.output
            .kv("ledger entries", &reconciliation.entries.to_string());
        ctx.output
            .kv("elapsed", &format!("{}ms", report.elapsed_ms));
    }

    verify(&report)?;
    ctx.output.success("No overselling, ledger balanced");
    Ok(())
}

/// One shopper: add to cart, check out, and drop the cart on refusal.
fn shopper(
    shop: &Shop,
    worker: usize,
    variant_id: &VariantId,
    attempts: usize,
    quantity: u32,
    progress: &ProgressBar,
) -> ShopperTally {
    let user = UserId::new(format!("shopper-{}", worker));
    let mut tally = ShopperTally::default();

    for attempt in 0..attempts {
        progress.inc(1);
        if let Err(e) = shop.carts.add_item(&user, variant_id, i64::from(quantity)) {
            tracing::warn!(worker, error = %e, "add to cart failed");
            tally.failed += 1;
            continue;
        }
        let payment = PaymentResult::captured(
            PaymentMethod::Card,
            format!("stress-{}-{}", worker, attempt),
        );
        match shop.checkout.checkout(&user, "1 Load Test Way", payment, None) {
            Ok(_) => {
                tally.orders += 1;
                tally.units += u64::from(quantity);
            }
            Err(e) => {
                if e.kind() == ErrorKind::Admission {
                    tally.refused += 1;
                } else {
                    tally.failed += 1;
                }
                if let Err(e) = shop.carts.clear(&user) {
                    tracing::warn!(worker, error = %e, "clearing cart failed");
                }
            }
        }
    }

    tally
}

fn verify(report: &StressReport) -> Result<()> {
    if report.tally.units > u64::from(report.opening_stock) {
        bail!(
            "oversold: {} units sold from a stock of {}",
            report.tally.units,
            report.opening_stock
        );
    }
    let consumed = i64::from(report.opening_stock) - i64::from(report.final_stock);
    if consumed != report.tally.units as i64 {
        bail!(
            "stock moved by {} but {} units were sold",
            consumed,
            report.tally.units
        );
    }
    if report.final_reserved != 0 {
        bail!("{} units left reserved", report.final_reserved);
    }
    if !report.balanced {
        bail!("ledger does not reconcile with the variant counters");
    }
    Ok(())
}
