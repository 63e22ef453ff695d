//! Typed view of the merged config document.
//!
//! Every field has a default, so an empty config (or no config file at all)
//! yields a runnable job. Values here are plain settings only; the database
//! URL is never stored, only the NAME of the env var that holds it.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub db: DbSettings,
    pub provider: ProviderSettings,
    pub calendar: CalendarSettings,
    pub tables: TablesSettings,
    pub normalize: NormalizeSettings,
    pub logging: LoggingSettings,
}

impl RefreshConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        serde_json::from_value(config_json.clone()).context("config does not match RefreshConfig")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbSettings {
    /// Name of the env var holding the Postgres URL.
    pub url_env: String,
    pub connect_timeout_secs: u64,
    pub max_connections: u32,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            url_env: "SDB_DATABASE_URL".to_string(),
            connect_timeout_secs: 10,
            max_connections: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Minimum spacing between two consecutive provider calls.
    pub min_request_interval_ms: u64,
    pub user_agent: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: "https://query2.finance.yahoo.com".to_string(),
            request_timeout_secs: 30,
            min_request_interval_ms: 250,
            user_agent: "Mozilla/5.0 (compatible; stock-db-refresh/0.1)".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    /// Exchange codes that never close (crypto, forex). Their tickers are
    /// never calendar-checked.
    pub always_open_exchanges: Vec<String>,
    /// Provider exchange code -> calendar name.
    pub aliases: BTreeMap<String, String>,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        let aliases = [
            ("NYQ", "NYSE"),
            ("PCX", "NYSE"),
            ("ASE", "NYSE"),
            ("BTS", "NYSE"),
            ("NMS", "NASDAQ"),
            ("NGM", "NASDAQ"),
            ("NCM", "NASDAQ"),
            ("LSE", "LSE"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            always_open_exchanges: vec!["CCC".to_string()],
            aliases,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesSettings {
    pub daily: TableSettings,
    pub five_minute: TableSettings,
    pub daily_forex: TableSettings,
}

/// Per-table knobs. `lookback_days` only applies to intraday tables and
/// `seed_pairs` only to the forex table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSettings {
    pub enabled: bool,
    /// First date fetched for a series with no stored rows.
    pub default_start: NaiveDate,
    /// Intraday history requested for a series with no stored rows.
    pub lookback_days: u32,
    /// Pairs ("GBP/USD") refreshed even when the table holds no rows for them.
    pub seed_pairs: Vec<String>,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_start: NaiveDate::from_ymd_opt(2019, 12, 31).unwrap_or(NaiveDate::MIN),
            lookback_days: 59,
            seed_pairs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeSettings {
    /// Exchanges quoting in minor units (pence). Tickers listed there are
    /// divided by 100 unless exempted below.
    pub minor_unit_exchanges: Vec<String>,
    /// Extra tickers quoted in minor units regardless of exchange.
    pub minor_unit_tickers: Vec<String>,
    /// Tickers on a minor-unit exchange that already quote in major units.
    pub major_unit_tickers: Vec<String>,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            minor_unit_exchanges: vec!["LSE".to_string()],
            minor_unit_tickers: Vec::new(),
            major_unit_tickers: Vec::new(),
        }
    }
}

impl NormalizeSettings {
    pub fn is_minor_units(&self, ticker: &str, exchange: &str) -> bool {
        if self.minor_unit_tickers.iter().any(|t| t == ticker) {
            return true;
        }
        self.minor_unit_exchanges.iter().any(|e| e == exchange)
            && !self.major_unit_tickers.iter().any(|t| t == ticker)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub dir: String,
    /// Log files are named `<file_prefix>_<YYYYMMDD>.log`.
    pub file_prefix: String,
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
            file_prefix: "stock_insertion".to_string(),
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = RefreshConfig::from_json(&json!({})).unwrap();
        assert_eq!(cfg, RefreshConfig::default());
        assert_eq!(cfg.db.url_env, "SDB_DATABASE_URL");
        assert_eq!(cfg.calendar.aliases.get("NYQ").map(String::as_str), Some("NYSE"));
        assert_eq!(
            cfg.tables.daily.default_start,
            NaiveDate::from_ymd_opt(2019, 12, 31).unwrap()
        );
    }

    #[test]
    fn partial_table_section_keeps_other_defaults() {
        let cfg = RefreshConfig::from_json(&json!({
            "tables": { "five_minute": { "enabled": false } }
        }))
        .unwrap();
        assert!(!cfg.tables.five_minute.enabled);
        assert_eq!(cfg.tables.five_minute.lookback_days, 59);
        assert!(cfg.tables.daily.enabled);
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = RefreshConfig::from_json(&json!({ "db": { "max_connections": "many" } }))
            .unwrap_err();
        assert!(format!("{err:#}").contains("RefreshConfig"));
    }

    #[test]
    fn exempt_ticker_is_not_minor_units() {
        let n = NormalizeSettings {
            major_unit_tickers: vec!["RR.L".to_string()],
            ..NormalizeSettings::default()
        };
        assert!(n.is_minor_units("BARC.L", "LSE"));
        assert!(!n.is_minor_units("RR.L", "LSE"));
        assert!(!n.is_minor_units("AAPL", "NMS"));
    }
}
