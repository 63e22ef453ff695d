//! Test doubles and fixtures for refresh scenarios.
//!
//! Nothing here touches the network or a database: [`MemStore`] stands in
//! for Postgres, [`ScriptedProvider`] for Yahoo and [`FixedCalendar`] for
//! the exchange calendars.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

use sdb_calendar::{CalendarError, TradingCalendar};
use sdb_config::RefreshConfig;
use sdb_md::{BarTime, RawBar};
use sdb_runtime::RefreshContext;

mod mem_store;
mod scripted_provider;

pub use mem_store::MemStore;
pub use scripted_provider::ScriptedProvider;

/// Calendar with a fixed set of closed codes. Any code not listed as open,
/// closed or always-open is unknown.
#[derive(Debug, Clone, Default)]
pub struct FixedCalendar {
    open: BTreeSet<String>,
    closed: BTreeSet<String>,
    always_open: BTreeSet<String>,
}

impl FixedCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(mut self, code: &str) -> Self {
        self.open.insert(code.to_string());
        self
    }

    pub fn closed(mut self, code: &str) -> Self {
        self.closed.insert(code.to_string());
        self
    }

    pub fn always_open(mut self, code: &str) -> Self {
        self.always_open.insert(code.to_string());
        self
    }
}

impl TradingCalendar for FixedCalendar {
    fn is_open_today(&self, exchange_code: &str, _now: DateTime<Utc>) -> Result<bool, CalendarError> {
        if self.open.contains(exchange_code) {
            Ok(true)
        } else if self.closed.contains(exchange_code) {
            Ok(false)
        } else {
            Err(CalendarError::UnknownExchange {
                code: exchange_code.to_string(),
            })
        }
    }

    fn is_always_open(&self, exchange_code: &str) -> bool {
        self.always_open.contains(exchange_code)
    }
}

/// Context over test doubles with pacing disabled.
pub fn test_context<C>(
    mut config: RefreshConfig,
    store: &MemStore,
    provider: &ScriptedProvider,
    calendar: C,
) -> RefreshContext
where
    C: TradingCalendar + 'static,
{
    config.provider.min_request_interval_ms = 0;
    RefreshContext {
        config,
        store: Arc::new(store.clone()),
        provider: Arc::new(provider.clone()),
        calendar: Arc::new(calendar),
    }
}

pub fn day_bar(symbol: &str, date: NaiveDate, o: f64, h: f64, l: f64, c: f64) -> RawBar {
    RawBar {
        symbol: symbol.to_string(),
        time: BarTime::Day(date),
        open: o,
        high: h,
        low: l,
        close: c,
        adj_close: Some(c),
        volume: Some(1_000),
    }
}

pub fn intraday_bar(symbol: &str, at: DateTime<Utc>, o: f64, h: f64, l: f64, c: f64) -> RawBar {
    RawBar {
        time: BarTime::Instant(at),
        ..day_bar(symbol, at.date_naive(), o, h, l, c)
    }
}

/// Load bars from a CSV fixture.
///
/// Columns: `symbol,time,open,high,low,close,adj_close,volume`. `time` is a
/// date (`2024-01-02`) or an RFC 3339 instant. Empty `adj_close` / `volume`
/// cells load as `None`.
pub fn load_bars_csv(path: &str) -> Result<Vec<RawBar>> {
    let mut rdr = csv::Reader::from_path(path).with_context(|| format!("open bars csv: {path}"))?;
    let mut out = Vec::new();

    for (i, rec) in rdr.records().enumerate() {
        let rec = rec.with_context(|| format!("read row {i}"))?;
        if rec.len() != 8 {
            bail!("row {i}: expected 8 columns, got {}", rec.len());
        }
        let num = |col: usize, name: &str| -> Result<f64> {
            rec[col]
                .trim()
                .parse::<f64>()
                .with_context(|| format!("row {i}: parse {name}"))
        };
        out.push(RawBar {
            symbol: rec[0].trim().to_string(),
            time: parse_time(rec[1].trim()).with_context(|| format!("row {i}: parse time"))?,
            open: num(2, "open")?,
            high: num(3, "high")?,
            low: num(4, "low")?,
            close: num(5, "close")?,
            adj_close: match rec[6].trim() {
                "" => None,
                _ => Some(num(6, "adj_close")?),
            },
            volume: match rec[7].trim() {
                "" => None,
                v => Some(v.parse::<i64>().with_context(|| format!("row {i}: parse volume"))?),
            },
        });
    }
    Ok(out)
}

fn parse_time(s: &str) -> Result<BarTime> {
    if s.len() == 10 {
        let d = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
        return Ok(BarTime::Day(d));
    }
    let t = DateTime::parse_from_rfc3339(s)?;
    Ok(BarTime::Instant(t.with_timezone(&Utc)))
}
