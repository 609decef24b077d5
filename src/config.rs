//! Engine limits and policy, read from `GUILD_BANK_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: invalid value '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("{key} must be at least 1")]
    Zero { key: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankConfig {
    /// Upper bound on purchasable tabs.
    pub max_tabs: u8,
    pub slots_per_tab: u8,
    pub inventory_slots: u8,
    /// Audit records kept per tab, and for the money channel.
    pub log_capacity: usize,
    /// Same-tab reorders additionally need deposit or withdraw rights on that tab.
    pub reorder_requires_deposit_or_withdraw: bool,
    /// Append every committed write set to this CSV file.
    pub journal: Option<PathBuf>,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            max_tabs: 8,
            slots_per_tab: 98,
            inventory_slots: 16,
            log_capacity: 25,
            reorder_requires_deposit_or_withdraw: true,
            journal: None,
        }
    }
}

impl BankConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source; absent or blank keys keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let config = Self {
            max_tabs: parse(&value, "GUILD_BANK_MAX_TABS", defaults.max_tabs)?,
            slots_per_tab: parse(&value, "GUILD_BANK_SLOTS_PER_TAB", defaults.slots_per_tab)?,
            inventory_slots: parse(
                &value,
                "GUILD_BANK_INVENTORY_SLOTS",
                defaults.inventory_slots,
            )?,
            log_capacity: parse(&value, "GUILD_BANK_LOG_CAPACITY", defaults.log_capacity)?,
            reorder_requires_deposit_or_withdraw: parse(
                &value,
                "GUILD_BANK_REORDER_NEEDS_DEPOSIT_OR_WITHDRAW",
                defaults.reorder_requires_deposit_or_withdraw,
            )?,
            journal: value("GUILD_BANK_JOURNAL").map(PathBuf::from),
        };

        for (key, size) in [
            ("GUILD_BANK_MAX_TABS", config.max_tabs as usize),
            ("GUILD_BANK_SLOTS_PER_TAB", config.slots_per_tab as usize),
            (
                "GUILD_BANK_INVENTORY_SLOTS",
                config.inventory_slots as usize,
            ),
            ("GUILD_BANK_LOG_CAPACITY", config.log_capacity),
        ] {
            if size == 0 {
                return Err(ConfigError::Zero { key });
            }
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(
    value: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_source_yields_defaults() {
        let config = BankConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, BankConfig::default());
    }

    #[test]
    fn values_override_defaults() {
        let config = BankConfig::from_lookup(lookup(&[
            ("GUILD_BANK_MAX_TABS", "6"),
            ("GUILD_BANK_SLOTS_PER_TAB", " 14 "),
            ("GUILD_BANK_REORDER_NEEDS_DEPOSIT_OR_WITHDRAW", "false"),
            ("GUILD_BANK_JOURNAL", "/tmp/journal.csv"),
        ]))
        .unwrap();
        assert_eq!(config.max_tabs, 6);
        assert_eq!(config.slots_per_tab, 14);
        assert!(!config.reorder_requires_deposit_or_withdraw);
        assert_eq!(config.journal, Some(PathBuf::from("/tmp/journal.csv")));
    }

    #[test]
    fn blank_value_keeps_default() {
        let config = BankConfig::from_lookup(lookup(&[("GUILD_BANK_LOG_CAPACITY", "  ")])).unwrap();
        assert_eq!(config.log_capacity, 25);
    }

    #[test]
    fn unparsable_value_is_an_error() {
        let err = BankConfig::from_lookup(lookup(&[("GUILD_BANK_MAX_TABS", "300")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "GUILD_BANK_MAX_TABS",
                value: "300".to_string()
            }
        );
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let err =
            BankConfig::from_lookup(lookup(&[("GUILD_BANK_SLOTS_PER_TAB", "0")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Zero {
                key: "GUILD_BANK_SLOTS_PER_TAB"
            }
        );
    }
}
