//! Environment-driven configuration
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Add REMINDER_STORE selection between SQLite and JSON file persistence
//! - 1.0.0: Initial creation with scheduler cadence and default timezone

use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Tokyo;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_PROBE_BUDGET: u32 = 14;

/// Which persistence backend the bot uses for reminders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Json,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "json" => Ok(StoreBackend::Json),
            other => Err(anyhow!("Invalid REMINDER_STORE: {other} (expected sqlite or json)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Only the bot binary needs this; library users may leave it unset
    pub discord_token: Option<String>,
    pub log_level: String,
    pub store_backend: StoreBackend,
    pub database_path: String,
    pub reminders_json_path: String,
    pub default_timezone: Tz,
    pub check_interval: Duration,
    pub delivery_timeout: Duration,
    pub probe_budget: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: None,
            log_level: "info".to_string(),
            store_backend: StoreBackend::Sqlite,
            database_path: "scrum_owl.db".to_string(),
            reminders_json_path: "data/reminders.json".to_string(),
            default_timezone: DEFAULT_TIMEZONE,
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            delivery_timeout: Duration::from_secs(DEFAULT_DELIVERY_TIMEOUT_SECS),
            probe_budget: DEFAULT_PROBE_BUDGET,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let store_backend = match lookup("REMINDER_STORE") {
            Some(v) => v.parse()?,
            None => defaults.store_backend,
        };

        let default_timezone = match lookup("DEFAULT_TIMEZONE") {
            Some(v) => v
                .trim()
                .parse::<Tz>()
                .map_err(|e| anyhow!("Invalid DEFAULT_TIMEZONE {v}: {e}"))?,
            None => defaults.default_timezone,
        };

        let check_interval_secs =
            parse_number(&lookup, "REMINDER_CHECK_INTERVAL_SECS", DEFAULT_CHECK_INTERVAL_SECS)?;
        if check_interval_secs == 0 {
            return Err(anyhow!("REMINDER_CHECK_INTERVAL_SECS must be at least 1"));
        }

        let delivery_timeout_secs = parse_number(
            &lookup,
            "REMINDER_DELIVERY_TIMEOUT_SECS",
            DEFAULT_DELIVERY_TIMEOUT_SECS,
        )?;
        if delivery_timeout_secs == 0 {
            return Err(anyhow!("REMINDER_DELIVERY_TIMEOUT_SECS must be at least 1"));
        }

        let probe_budget =
            parse_number(&lookup, "REMINDER_PROBE_BUDGET", DEFAULT_PROBE_BUDGET as u64)? as u32;
        if probe_budget == 0 {
            return Err(anyhow!("REMINDER_PROBE_BUDGET must be at least 1"));
        }

        Ok(Self {
            discord_token: lookup("DISCORD_TOKEN").filter(|t| !t.trim().is_empty()),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            store_backend,
            database_path: lookup("DATABASE_PATH").unwrap_or(defaults.database_path),
            reminders_json_path: lookup("REMINDERS_JSON_PATH")
                .unwrap_or(defaults.reminders_json_path),
            default_timezone,
            check_interval: Duration::from_secs(check_interval_secs),
            delivery_timeout: Duration::from_secs(delivery_timeout_secs),
            probe_budget,
        })
    }

    /// The Discord token, or an error naming the missing variable
    pub fn require_discord_token(&self) -> Result<&str> {
        self.discord_token
            .as_deref()
            .ok_or_else(|| anyhow!("DISCORD_TOKEN must be set"))
    }
}

fn parse_number<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .map_err(|e| anyhow!("Invalid {key}={v}: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Sqlite);
        assert_eq!(config.default_timezone, chrono_tz::Asia::Tokyo);
        assert_eq!(config.check_interval, Duration::from_secs(60));
        assert_eq!(config.probe_budget, 14);
        assert!(config.discord_token.is_none());
        assert!(config.require_discord_token().is_err());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("REMINDER_STORE", "JSON"),
            ("DEFAULT_TIMEZONE", "Europe/Berlin"),
            ("REMINDER_CHECK_INTERVAL_SECS", "30"),
            ("REMINDER_PROBE_BUDGET", "21"),
        ]))
        .unwrap();
        assert_eq!(config.require_discord_token().unwrap(), "abc");
        assert_eq!(config.store_backend, StoreBackend::Json);
        assert_eq!(config.default_timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.check_interval, Duration::from_secs(30));
        assert_eq!(config.probe_budget, 21);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_lookup(lookup_from(&[("DEFAULT_TIMEZONE", "Mars/Base")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("REMINDER_STORE", "redis")])).is_err());
        assert!(
            Config::from_lookup(lookup_from(&[("REMINDER_CHECK_INTERVAL_SECS", "0")])).is_err()
        );
        assert!(
            Config::from_lookup(lookup_from(&[("REMINDER_CHECK_INTERVAL_SECS", "soon")])).is_err()
        );
        let err = Config::from_lookup(lookup_from(&[("REMINDER_DELIVERY_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("REMINDER_DELIVERY_TIMEOUT_SECS"));
    }
}
