//! Watermark -> fetch bound.
//!
//! Daily and forex series resume the day after their last stored date.
//! Intraday series resume strictly after their last stored UTC instant, but
//! never earlier than `lookback_days` before now: the provider refuses
//! intraday windows older than that.
//! A series with no rows starts from the table's configured default.

use chrono::{DateTime, Days, Duration, Utc};

use sdb_config::TableSettings;
use sdb_md::{BarTime, FetchBound, TableKind};

pub fn fetch_bound(
    table: TableKind,
    watermark: Option<BarTime>,
    settings: &TableSettings,
    now: DateTime<Utc>,
) -> FetchBound {
    match (table, watermark) {
        (TableKind::FiveMinute, Some(BarTime::Instant(t))) => {
            FetchBound::After(t.max(lookback_floor(settings, now)))
        }
        (TableKind::FiveMinute, None) => FetchBound::After(lookback_floor(settings, now)),
        (_, Some(last)) => FetchBound::FromDate(next_day(last)),
        (_, None) => FetchBound::FromDate(settings.default_start),
    }
}

fn lookback_floor(settings: &TableSettings, now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(i64::from(settings.lookback_days))
}

/// The stretch an intraday watermark lost to the lookback floor, if any.
pub fn intraday_gap(watermark: Option<BarTime>, bound: &FetchBound) -> Option<Duration> {
    match (watermark, bound) {
        (Some(BarTime::Instant(t)), FetchBound::After(start)) if *start > t => Some(*start - t),
        _ => None,
    }
}

fn next_day(last: BarTime) -> chrono::NaiveDate {
    let d = match last {
        BarTime::Day(d) => d,
        BarTime::Instant(t) => t.date_naive(),
    };
    d.checked_add_days(Days::new(1)).unwrap_or(d)
}

/// True when the bound starts after `now`: nothing can be new yet.
pub fn is_up_to_date(bound: &FetchBound, now: DateTime<Utc>) -> bool {
    bound.request_start() > now
}
