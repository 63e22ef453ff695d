//! Table-shaped records from repaired bars.
//!
//! Per table kind this module:
//! - labels each row with its ticker or currency pair,
//! - fills a missing adjusted close with the close (equity tables),
//! - divides prices by 100 for tickers quoted in minor units (pence),
//! - drops volume and adjusted close for forex rows.
//!
//! It does **not** fetch, repair OHLC (that is `repair.rs`) or write to the DB.
//!
//! # Adjusted-close policy
//! Equity tables require an adjusted close. When the provider omits it the
//! close is stored in its place. Every substitution is counted in
//! [`NormalizeReport::adj_close_fallbacks`] and logged once per series.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use tracing::warn;

use crate::provider::RawBar;
use crate::{BarTime, TableKind};

const MINOR_UNITS_PER_MAJOR: f64 = 100.0;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// A `daily` or `five_minute` row.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityRow {
    pub ticker: String,
    pub time: BarTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: Option<i64>,
}

/// A `daily_forex` row. No volume, no adjusted close.
#[derive(Debug, Clone, PartialEq)]
pub struct ForexRow {
    pub currency_pair: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// One row bound for one insert attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertRecord {
    Equity(EquityRow),
    Forex(ForexRow),
}

impl InsertRecord {
    /// Series label (ticker or pair).
    pub fn series(&self) -> &str {
        match self {
            InsertRecord::Equity(r) => &r.ticker,
            InsertRecord::Forex(r) => &r.currency_pair,
        }
    }

    pub fn time(&self) -> BarTime {
        match self {
            InsertRecord::Equity(r) => r.time,
            InsertRecord::Forex(r) => BarTime::Day(r.date),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub adj_close_fallbacks: usize,
    pub unit_corrected: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub records: Vec<InsertRecord>,
    pub report: NormalizeReport,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A bar whose timestamp shape does not fit the destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeShapeError {
    pub table: TableKind,
    pub series: String,
    pub time: BarTime,
}

impl fmt::Display for TimeShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bar time {} for '{}' does not fit table {}",
            self.time, self.series, self.table
        )
    }
}

impl std::error::Error for TimeShapeError {}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Turn a repaired batch into insert records for `table`.
///
/// `minor_unit_series` lists the tickers quoted in minor units; it is ignored
/// for the forex table.
pub fn normalize_batch(
    table: TableKind,
    bars: Vec<RawBar>,
    minor_unit_series: &BTreeSet<String>,
) -> Result<NormalizedBatch, TimeShapeError> {
    let mut out = NormalizedBatch {
        records: Vec::with_capacity(bars.len()),
        report: NormalizeReport::default(),
    };
    let mut warned: BTreeSet<String> = BTreeSet::new();

    for bar in bars {
        check_time_shape(table, &bar)?;

        if table.is_forex() {
            out.records.push(InsertRecord::Forex(forex_row(bar)));
            continue;
        }

        let adj_close = match bar.adj_close {
            Some(v) => v,
            None => {
                out.report.adj_close_fallbacks += 1;
                if warned.insert(bar.symbol.clone()) {
                    warn!(
                        table = %table,
                        ticker = %bar.symbol,
                        "no adjusted close returned; storing close as adj_close"
                    );
                }
                bar.close
            }
        };

        let mut row = EquityRow {
            ticker: bar.symbol,
            time: bar.time,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            adj_close,
            volume: bar.volume,
        };

        if minor_unit_series.contains(&row.ticker) {
            to_major_units(&mut row);
            out.report.unit_corrected += 1;
        }

        out.records.push(InsertRecord::Equity(row));
    }

    Ok(out)
}

fn check_time_shape(table: TableKind, bar: &RawBar) -> Result<(), TimeShapeError> {
    let fits = match (table, bar.time) {
        (TableKind::FiveMinute, BarTime::Instant(_)) => true,
        (TableKind::Daily | TableKind::DailyForex, BarTime::Day(_)) => true,
        _ => false,
    };
    if fits {
        Ok(())
    } else {
        Err(TimeShapeError {
            table,
            series: bar.symbol.clone(),
            time: bar.time,
        })
    }
}

fn forex_row(bar: RawBar) -> ForexRow {
    // check_time_shape has already pinned this to a Day.
    let date = match bar.time {
        BarTime::Day(d) => d,
        BarTime::Instant(t) => t.date_naive(),
    };
    ForexRow {
        currency_pair: bar.symbol,
        date,
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close: bar.close,
    }
}

fn to_major_units(row: &mut EquityRow) {
    row.open /= MINOR_UNITS_PER_MAJOR;
    row.high /= MINOR_UNITS_PER_MAJOR;
    row.low /= MINOR_UNITS_PER_MAJOR;
    row.close /= MINOR_UNITS_PER_MAJOR;
    row.adj_close /= MINOR_UNITS_PER_MAJOR;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
