//! Replay a scenario file.

use std::fs;

use anyhow::{bail, Context as _, Result};

use super::RunArgs;
use crate::context::Context;
use crate::output::status_badge;
use crate::scenario::{Expect, Scenario, ScenarioReport, ScenarioRunner, StepOutcome};

/// Run the run command.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let path = ctx.resolve_path(&args.scenario);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read scenario: {}", path.display()))?;
    let scenario = Scenario::parse(&path.to_string_lossy(), &content)?;

    let title = scenario
        .name
        .clone()
        .unwrap_or_else(|| args.scenario.clone());
    ctx.output.header(&format!("Scenario: {}", title));
    ctx.output.debug(&format!(
        "{} variant(s), {} step(s)",
        scenario.variants.len(),
        scenario.steps.len()
    ));

    let total = scenario.steps.len();
    let mut runner = ScenarioRunner::new(ctx.config.commerce.clone());
    let report = runner.run(&scenario, args.fail_fast, |outcome| {
        print_step(ctx, outcome, total)
    })?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
    } else {
        print_summary(ctx, &report);
    }

    let mismatched = report.mismatches().count();
    let unbalanced = report.unbalanced().count();
    tracing::info!(
        steps = report.steps.len(),
        mismatched,
        unbalanced,
        "scenario finished"
    );

    if unbalanced > 0 {
        bail!("{} variant(s) do not reconcile with the ledger", unbalanced);
    }
    if mismatched > 0 {
        bail!("{} step(s) did not match their expectation", mismatched);
    }

    ctx.output.success("Scenario passed");
    Ok(())
}

fn print_step(ctx: &Context, outcome: &StepOutcome, total: usize) {
    let badge = match (outcome.ok, outcome.expected, outcome.matched()) {
        (true, _, true) => status_badge("ok"),
        (false, Expect::Fail, true) => status_badge("expected failure"),
        _ => status_badge("unexpected"),
    };
    ctx.output.step(
        outcome.index,
        total,
        &format!("{:<16} {} {}", outcome.action, badge, outcome.detail),
    );
}

fn print_summary(ctx: &Context, report: &ScenarioReport) {
    ctx.output.header("Stock");
    let widths = [14, 12, 7, 9, 10, 8, 9];
    ctx.output.table_row(
        &[
            "VARIANT",
            "SKU",
            "STOCK",
            "RESERVED",
            "AVAILABLE",
            "ENTRIES",
            "LEDGER",
        ],
        &widths,
    );
    for v in &report.variants {
        let ledger = if v.balanced {
            status_badge("balanced")
        } else {
            status_badge("drift")
        };
        ctx.output.table_row(
            &[
                v.id.as_str(),
                &v.sku,
                &v.stock.to_string(),
                &v.reserved.to_string(),
                &v.available.to_string(),
                &v.ledger_entries.to_string(),
                &ledger,
            ],
            &widths,
        );
    }

    if report.orders.is_empty() {
        return;
    }

    ctx.output.header("Orders");
    let widths = [12, 38, 11, 10, 9];
    ctx.output
        .table_row(&["LABEL", "ORDER", "STATUS", "TOTAL", "PAYMENT"], &widths);
    for order in &report.orders {
        let payment = order
            .payment
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        ctx.output.table_row(
            &[
                &order.label,
                order.id.as_str(),
                &status_badge(order.status.as_str()),
                &order.total.display(),
                &payment,
            ],
            &widths,
        );
    }
}
