//! Exchange calendar filter.
//!
//! Maps provider exchange codes (`NYQ`, `NMS`, `LSE`, ...) onto built-in
//! session calendars and answers "is this exchange open today?". Codes on
//! the always-open list (crypto, forex) are never checked. A code that maps
//! to no calendar is an error, never a silent skip.
//!
//! This crate does NOT read tickers or talk to the database; the refresh
//! pipeline feeds it exchange codes.

use chrono::{DateTime, Datelike, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

mod session;

pub use session::SessionCalendar;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// No alias and no built-in calendar for this exchange code.
    UnknownExchange { code: String },
}

impl std::fmt::Display for CalendarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalendarError::UnknownExchange { code } => {
                write!(f, "CALENDAR_UNKNOWN_EXCHANGE: no trading calendar for exchange code '{code}'")
            }
        }
    }
}

impl std::error::Error for CalendarError {}

// ---------------------------------------------------------------------------
// TradingCalendar seam
// ---------------------------------------------------------------------------

/// Answers whether an exchange has a session on its local "today".
pub trait TradingCalendar: Send + Sync {
    fn is_open_today(&self, exchange_code: &str, now: DateTime<Utc>) -> Result<bool, CalendarError>;

    /// Whether `exchange_code` is exempt from calendar checks.
    fn is_always_open(&self, exchange_code: &str) -> bool;
}

/// Exchange codes (from `codes`) that are closed at `now`.
///
/// Always-open codes are never reported closed. The first unknown code aborts
/// the whole evaluation.
pub fn closed_exchanges<'a, C, I>(
    calendar: &C,
    codes: I,
    now: DateTime<Utc>,
) -> Result<BTreeSet<String>, CalendarError>
where
    C: TradingCalendar + ?Sized,
    I: IntoIterator<Item = &'a str>,
{
    let mut closed = BTreeSet::new();
    for code in codes {
        if calendar.is_always_open(code) {
            continue;
        }
        if !calendar.is_open_today(code, now)? {
            closed.insert(code.to_string());
        }
    }
    Ok(closed)
}

// ---------------------------------------------------------------------------
// ExchangeCalendars
// ---------------------------------------------------------------------------

/// The production calendar: alias table plus built-in session calendars.
#[derive(Clone, Debug)]
pub struct ExchangeCalendars {
    aliases: BTreeMap<String, String>,
    always_open: BTreeSet<String>,
}

impl ExchangeCalendars {
    pub fn new<A, O>(aliases: A, always_open: O) -> Self
    where
        A: IntoIterator<Item = (String, String)>,
        O: IntoIterator<Item = String>,
    {
        Self {
            aliases: aliases
                .into_iter()
                .map(|(k, v)| (k.trim().to_ascii_uppercase(), v))
                .collect(),
            always_open: always_open
                .into_iter()
                .map(|c| c.trim().to_ascii_uppercase())
                .collect(),
        }
    }

    /// Calendar for a provider exchange code, through the alias table first
    /// and then by calendar name.
    pub fn resolve(&self, exchange_code: &str) -> Result<SessionCalendar, CalendarError> {
        let key = exchange_code.trim().to_ascii_uppercase();
        let name = self.aliases.get(&key).map(String::as_str).unwrap_or(&key);
        SessionCalendar::by_name(name).ok_or_else(|| CalendarError::UnknownExchange {
            code: exchange_code.to_string(),
        })
    }
}

impl TradingCalendar for ExchangeCalendars {
    fn is_open_today(&self, exchange_code: &str, now: DateTime<Utc>) -> Result<bool, CalendarError> {
        if self.is_always_open(exchange_code) {
            return Ok(true);
        }
        let cal = self.resolve(exchange_code)?;
        let day = cal.local_date(now);
        if !cal.covers_year(day.year()) {
            warn!(
                exchange = exchange_code,
                year = day.year(),
                "holiday table does not cover year; weekends only"
            );
        }
        Ok(cal.is_session_day(day))
    }

    fn is_always_open(&self, exchange_code: &str) -> bool {
        self.always_open
            .contains(&exchange_code.trim().to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn calendars() -> ExchangeCalendars {
        ExchangeCalendars::new(
            [
                ("NYQ".to_string(), "NYSE".to_string()),
                ("NMS".to_string(), "NASDAQ".to_string()),
            ],
            ["CCC".to_string()],
        )
    }

    #[test]
    fn alias_and_direct_name_both_resolve() {
        let c = calendars();
        assert_eq!(c.resolve("NYQ").unwrap(), SessionCalendar::UsEquity);
        assert_eq!(c.resolve("lse").unwrap(), SessionCalendar::LondonEquity);
    }

    #[test]
    fn unknown_code_is_an_error() {
        let err = calendars().resolve("XYZ").unwrap_err();
        assert_eq!(err, CalendarError::UnknownExchange { code: "XYZ".to_string() });
        assert!(err.to_string().contains("CALENDAR_UNKNOWN_EXCHANGE"));
    }

    #[test]
    fn always_open_code_is_never_closed() {
        // Saturday.
        let now = Utc.with_ymd_and_hms(2024, 1, 6, 15, 0, 0).unwrap();
        let closed = closed_exchanges(&calendars(), ["CCC", "NYQ"], now).unwrap();
        assert_eq!(closed, BTreeSet::from(["NYQ".to_string()]));
    }

    #[test]
    fn year_outside_holiday_table_falls_back_to_weekends() {
        let c = calendars();
        assert!(!SessionCalendar::UsEquity.covers_year(2030));
        // 2030-12-25 is a Wednesday, absent from the table.
        let xmas = Utc.with_ymd_and_hms(2030, 12, 25, 15, 0, 0).unwrap();
        assert!(c.is_open_today("NYQ", xmas).unwrap());
        // Saturday.
        let sat = Utc.with_ymd_and_hms(2030, 12, 28, 15, 0, 0).unwrap();
        assert!(!c.is_open_today("NYQ", sat).unwrap());
    }
}
