//! Configuration management commands.

use std::fs;

use anyhow::{bail, Result};

use super::{ConfigArgs, ConfigCommand};
use crate::config::{generate_default_config, CliConfig, CONFIG_FILE_NAMES};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Get { key } => get_config(&key, ctx).await,
        ConfigCommand::Init { force } => init_config(force, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    let commerce = &ctx.config.commerce;
    ctx.output.info("");
    ctx.output.info("[commerce]");
    ctx.output.kv("currency", commerce.currency.code());
    ctx.output
        .kv("price_snapshot", &format!("{:?}", commerce.price_snapshot));
    ctx.output.kv(
        "max_quantity_per_line",
        &commerce.max_quantity_per_line.to_string(),
    );

    ctx.output.info("");
    ctx.output.info("[commerce.lock]");
    ctx.output
        .kv("retry_budget", &commerce.lock.retry_budget.to_string());
    ctx.output.kv("backoff_us", &commerce.lock.backoff_us.to_string());

    let logging = &ctx.config.logging;
    ctx.output.info("");
    ctx.output.info("[logging]");
    ctx.output.kv("level", logging.level.as_str());
    ctx.output.kv("format", &format!("{:?}", logging.format).to_lowercase());
    if let Some(filter) = &logging.filter {
        ctx.output.kv("filter", filter);
    }

    Ok(())
}

async fn get_config(key: &str, ctx: &Context) -> Result<()> {
    let value = get_config_value(&ctx.config, key)?;

    if ctx.output.is_json() {
        ctx.output
            .json(&serde_json::json!({ "key": key, "value": value }));
    } else {
        println!("{}", value);
    }

    Ok(())
}

async fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join(CONFIG_FILE_NAMES[0]);

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, generate_default_config())?;
    tracing::debug!(path = %config_path.display(), "config written");

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let (errors, warnings) = ctx.config.check();

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "valid": errors.is_empty(),
            "errors": errors,
            "warnings": warnings,
        }));
    }

    if errors.is_empty() && warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for error in &errors {
        ctx.output.error(&format!("Error: {}", error));
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }

    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}

/// Look up a dotted key such as `commerce.lock.retry_budget`.
fn get_config_value(config: &CliConfig, key: &str) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(config)?;
    for part in key.split('.') {
        value = match value {
            serde_json::Value::Object(mut map) => match map.remove(part) {
                Some(inner) => inner,
                None => bail!("Unknown config key: {}", key),
            },
            _ => bail!("Unknown config key: {}", key),
        };
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_nested_value() {
        let config = CliConfig::default();
        assert_eq!(
            get_config_value(&config, "commerce.lock.retry_budget").unwrap(),
            serde_json::json!(1000)
        );
        assert_eq!(
            get_config_value(&config, "logging.level").unwrap(),
            serde_json::json!("info")
        );
    }

    #[test]
    fn test_get_unknown_key() {
        let config = CliConfig::default();
        assert!(get_config_value(&config, "commerce.nope").is_err());
        assert!(get_config_value(&config, "commerce.currency.code").is_err());
    }
}
