//! CLI configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stockroom_commerce::CommerceConfig;
use stockroom_observability::LoggingConfig;

/// Config file names searched for, in order.
pub const CONFIG_FILE_NAMES: [&str; 3] = ["stockroom.toml", ".stockroom.toml", "stockroom.json"];

/// CLI configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Ledger, cart and checkout settings.
    #[serde(default)]
    pub commerce: CommerceConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::parse(path, &content)
    }

    /// Parse config text; `path` decides between JSON and TOML.
    pub fn parse(path: &str, content: &str) -> Result<Self> {
        if path.ends_with(".json") {
            serde_json::from_str(content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            toml::from_str(content).with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }

    /// Problems that make the config unusable, and ones worth a warning.
    pub fn check(&self) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.commerce.max_quantity_per_line == 0 {
            errors.push("commerce.max_quantity_per_line must be at least 1".to_string());
        }
        if self.commerce.lock.retry_budget == 0 {
            warnings.push(
                "commerce.lock.retry_budget is 0; every reservation makes a single attempt"
                    .to_string(),
            );
        }
        if self.commerce.lock.backoff_us > 100_000 {
            warnings.push(format!(
                "commerce.lock.backoff_us is {}us; contended checkouts will be slow",
                self.commerce.lock.backoff_us
            ));
        }
        if let Some(filter) = &self.logging.filter {
            if filter.trim().is_empty() {
                warnings.push("logging.filter is empty".to_string());
            }
        }

        (errors, warnings)
    }
}

/// Generate default config file content.
pub fn generate_default_config() -> String {
    r#"# Stockroom configuration

[commerce]
# Currency of every price and order total
currency = "USD"
# Re-adding a variant to a cart: "frozen" keeps the first price, "refresh" takes the current one
price_snapshot = "frozen"
# Upper bound on a single cart line
max_quantity_per_line = 9999

[commerce.lock]
# Attempts to take a variant row lock before a reservation is refused
retry_budget = 1000
# Pause between attempts, in microseconds
backoff_us = 100

[logging]
# trace | debug | info | warn | error
level = "info"
# human | json
format = "human"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_commerce::prelude::PriceSnapshotPolicy;
    use stockroom_observability::LogFormat;

    #[test]
    fn test_default_config_parses() {
        let config = CliConfig::parse("stockroom.toml", &generate_default_config()).unwrap();
        assert_eq!(config.commerce, CommerceConfig::default());
        assert_eq!(config.logging.format, LogFormat::Human);
        let (errors, warnings) = config.check();
        assert!(errors.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = CliConfig::parse(
            "stockroom.toml",
            "[commerce]\nprice_snapshot = \"refresh\"\n",
        )
        .unwrap();
        assert_eq!(config.commerce.price_snapshot, PriceSnapshotPolicy::RefreshOnAdd);
        assert_eq!(config.commerce.max_quantity_per_line, 9999);
    }

    #[test]
    fn test_json_config() {
        let config = CliConfig::parse(
            "stockroom.json",
            r#"{"logging": {"level": "debug", "format": "json"}}"#,
        )
        .unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_check_rejects_zero_line_cap() {
        let mut config = CliConfig::default();
        config.commerce.max_quantity_per_line = 0;
        let (errors, _) = config.check();
        assert_eq!(errors.len(), 1);
    }
}
