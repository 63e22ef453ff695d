//! Which series a table run refreshes.
//!
//! Equity tables: every ticker in `tickers` whose exchange is open today.
//! Forex table: every pair already in `daily_forex`, plus configured seeds.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::info;

use sdb_calendar::{closed_exchanges, CalendarError, TradingCalendar};
use sdb_config::NormalizeSettings;
use sdb_db::TickerRow;

/// One series to refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    /// Stored label: ticker or `"GBP/USD"` pair.
    pub label: String,
    /// Prices arrive in minor units (pence) and need dividing by 100.
    pub minor_units: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquityUniverse {
    pub series: Vec<Series>,
    pub closed_exchanges: Vec<String>,
    pub skipped_tickers: usize,
}

/// Drop tickers listed on exchanges closed at `now`.
pub fn equity_universe<C>(
    tickers: Vec<TickerRow>,
    calendar: &C,
    normalize: &NormalizeSettings,
    now: DateTime<Utc>,
) -> Result<EquityUniverse, CalendarError>
where
    C: TradingCalendar + ?Sized,
{
    let codes: BTreeSet<&str> = tickers.iter().map(|t| t.exchange.as_str()).collect();
    let closed = closed_exchanges(calendar, codes.iter().copied(), now)?;

    if !closed.is_empty() {
        info!(closed = ?closed, "exchanges closed today; their tickers are skipped");
    }

    let mut out = EquityUniverse {
        closed_exchanges: closed.iter().cloned().collect(),
        ..EquityUniverse::default()
    };
    for t in tickers {
        if closed.contains(&t.exchange) {
            out.skipped_tickers += 1;
            continue;
        }
        out.series.push(Series {
            minor_units: normalize.is_minor_units(&t.ticker, &t.exchange),
            label: t.ticker,
        });
    }
    Ok(out)
}

/// Stored pairs plus seeds, deduplicated and sorted. Forex is never unit
/// corrected.
pub fn forex_universe(stored: Vec<String>, seeds: &[String]) -> Vec<Series> {
    let pairs: BTreeSet<String> = stored
        .into_iter()
        .chain(seeds.iter().cloned())
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    pairs
        .into_iter()
        .map(|label| Series {
            label,
            minor_units: false,
        })
        .collect()
}
