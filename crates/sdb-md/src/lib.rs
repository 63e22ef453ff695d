//! sdb-md
//!
//! Market-data side of the refresh job: the provider boundary, the Yahoo
//! chart adapter, forex symbol encoding, OHLC repair and row normalization.
//!
//! This crate does **not** write to the DB; the runtime fetches bars here and
//! hands the normalized records to sdb-db.

pub mod normalizer;
pub mod provider;
pub mod repair;
pub mod symbol;
pub mod yahoo;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use normalizer::{normalize_batch, EquityRow, ForexRow, InsertRecord, NormalizeReport, NormalizedBatch};
pub use provider::{BarProvider, FetchRequest, ProviderError, RawBar};
pub use repair::{repair_batch, RepairReport};
pub use symbol::{pair_to_provider_symbol, provider_symbol_to_pair, SymbolError};
pub use yahoo::YahooProvider;

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

/// Bar interval requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    Daily,
    FiveMinute,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::FiveMinute => "5m",
        }
    }
}

// ---------------------------------------------------------------------------
// TableKind
// ---------------------------------------------------------------------------

/// One destination table and everything that differs between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TableKind {
    Daily,
    FiveMinute,
    DailyForex,
}

impl TableKind {
    /// Scheduled order of a full refresh.
    pub const ALL: [TableKind; 3] = [TableKind::Daily, TableKind::FiveMinute, TableKind::DailyForex];

    pub fn table_name(&self) -> &'static str {
        match self {
            TableKind::Daily => "daily",
            TableKind::FiveMinute => "five_minute",
            TableKind::DailyForex => "daily_forex",
        }
    }

    /// Column naming the series in this table.
    pub fn series_column(&self) -> &'static str {
        match self {
            TableKind::DailyForex => "currency_pair",
            TableKind::Daily | TableKind::FiveMinute => "ticker",
        }
    }

    pub fn interval(&self) -> Interval {
        match self {
            TableKind::FiveMinute => Interval::FiveMinute,
            TableKind::Daily | TableKind::DailyForex => Interval::Daily,
        }
    }

    pub fn is_forex(&self) -> bool {
        matches!(self, TableKind::DailyForex)
    }

    /// Provider symbol for a stored series label.
    pub fn provider_symbol(&self, series: &str) -> Result<String, SymbolError> {
        if self.is_forex() {
            pair_to_provider_symbol(series)
        } else {
            Ok(series.to_string())
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(TableKind::Daily),
            "five_minute" | "5m" => Ok(TableKind::FiveMinute),
            "daily_forex" | "forex" => Ok(TableKind::DailyForex),
            other => Err(anyhow!(
                "invalid table '{}'. expected one of: daily | five_minute | daily_forex",
                other
            )),
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

// ---------------------------------------------------------------------------
// BarTime / FetchBound
// ---------------------------------------------------------------------------

/// Timestamp of a bar: a trading date for daily series, a UTC instant for
/// intraday series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BarTime {
    Day(NaiveDate),
    Instant(DateTime<Utc>),
}

impl BarTime {
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            BarTime::Day(d) => Some(*d),
            BarTime::Instant(_) => None,
        }
    }

    pub fn as_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            BarTime::Instant(t) => Some(*t),
            BarTime::Day(_) => None,
        }
    }
}

impl fmt::Display for BarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarTime::Day(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            BarTime::Instant(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

/// Lower bound of an incremental fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchBound {
    /// First trading date wanted (inclusive).
    FromDate(NaiveDate),
    /// Only bars strictly after this instant.
    After(DateTime<Utc>),
}

impl FetchBound {
    /// Instant to ask the provider to start from.
    pub fn request_start(&self) -> DateTime<Utc> {
        match self {
            FetchBound::FromDate(d) => d.and_time(NaiveTime::MIN).and_utc(),
            FetchBound::After(t) => *t,
        }
    }

    /// Whether a returned bar lies past the bound. Providers may echo the
    /// boundary bar back; those are rejected here.
    pub fn admits(&self, time: &BarTime) -> bool {
        match (self, time) {
            (FetchBound::FromDate(start), BarTime::Day(d)) => d >= start,
            (FetchBound::FromDate(start), BarTime::Instant(t)) => t.date_naive() >= *start,
            (FetchBound::After(after), BarTime::Instant(t)) => t > after,
            (FetchBound::After(after), BarTime::Day(d)) => *d > after.date_naive(),
        }
    }
}

impl fmt::Display for FetchBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchBound::FromDate(d) => write!(f, ">= {}", d.format("%Y-%m-%d")),
            FetchBound::After(t) => write!(f, "> {}", t.to_rfc3339()),
        }
    }
}

// -----------------
// Tests (no network)
// -----------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn table_parse() {
        assert_eq!(TableKind::parse("daily").unwrap(), TableKind::Daily);
        assert_eq!(TableKind::parse("FIVE_MINUTE").unwrap(), TableKind::FiveMinute);
        assert_eq!(TableKind::parse("daily_forex").unwrap(), TableKind::DailyForex);
        assert!(TableKind::parse("weekly").is_err());
    }

    #[test]
    fn forex_table_encodes_provider_symbol() {
        assert_eq!(TableKind::DailyForex.provider_symbol("GBP/USD").unwrap(), "GBPUSD=X");
        assert_eq!(TableKind::Daily.provider_symbol("BARC.L").unwrap(), "BARC.L");
    }

    #[test]
    fn date_bound_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let b = FetchBound::FromDate(start);
        assert!(b.admits(&BarTime::Day(start)));
        assert!(!b.admits(&BarTime::Day(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())));
        assert_eq!(
            b.request_start(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn instant_bound_is_exclusive() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 20, 55, 0).unwrap();
        let b = FetchBound::After(t);
        assert!(!b.admits(&BarTime::Instant(t)));
        assert!(b.admits(&BarTime::Instant(t + chrono::Duration::minutes(5))));
    }
}
