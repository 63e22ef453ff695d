//! sdb-runtime
//!
//! Orchestrates a refresh run: for each table, pick the series to refresh,
//! resolve watermarks, fetch, repair, normalize and insert inside one
//! transaction per table.
//!
//! This crate does not parse CLI arguments or install logging; sdb-cli does.

mod fetch;
pub mod pipeline;
pub mod store;
pub mod universe;
pub mod watermark;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use sdb_calendar::{ExchangeCalendars, TradingCalendar};
use sdb_config::{CalendarSettings, ProviderSettings, RefreshConfig, TableSettings};
use sdb_md::{BarProvider, TableKind, YahooProvider};

pub use fetch::BarFetcher;
pub use pipeline::{
    run_all, run_table, FailedDownload, FailedInsert, RunSummary, TableOutcome, TableReport,
};
pub use store::{PgStore, RefreshSession, RefreshStore};
pub use universe::{equity_universe, forex_universe, EquityUniverse, Series};
pub use watermark::{fetch_bound, intraday_gap, is_up_to_date};

/// Everything a refresh run needs. Collaborators are trait objects so tests
/// can swap the database, provider and calendar.
pub struct RefreshContext {
    pub config: RefreshConfig,
    pub store: Arc<dyn RefreshStore>,
    pub provider: Arc<dyn BarProvider>,
    pub calendar: Arc<dyn TradingCalendar>,
}

impl RefreshContext {
    pub fn table_settings(&self, table: TableKind) -> &TableSettings {
        table_settings(&self.config, table)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.config.provider.request_timeout_secs)
    }

    pub fn provider_min_interval(&self) -> Duration {
        Duration::from_millis(self.config.provider.min_request_interval_ms)
    }

    /// Enabled tables in run order (daily, five_minute, daily_forex).
    pub fn enabled_tables(&self) -> Vec<TableKind> {
        enabled_tables(&self.config)
    }
}

pub fn table_settings(config: &RefreshConfig, table: TableKind) -> &TableSettings {
    match table {
        TableKind::Daily => &config.tables.daily,
        TableKind::FiveMinute => &config.tables.five_minute,
        TableKind::DailyForex => &config.tables.daily_forex,
    }
}

pub fn enabled_tables(config: &RefreshConfig) -> Vec<TableKind> {
    TableKind::ALL
        .iter()
        .copied()
        .filter(|t| table_settings(config, *t).enabled)
        .collect()
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub fn calendars_from_config(settings: &CalendarSettings) -> ExchangeCalendars {
    ExchangeCalendars::new(
        settings
            .aliases
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
        settings.always_open_exchanges.iter().cloned(),
    )
}

pub fn yahoo_from_config(settings: &ProviderSettings) -> Result<YahooProvider> {
    YahooProvider::new(
        &settings.base_url,
        &settings.user_agent,
        Duration::from_secs(settings.request_timeout_secs),
    )
    .context("build yahoo provider failed")
}
