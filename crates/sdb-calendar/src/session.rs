//! Exchange session days.
//!
//! Deterministic, pure logic. No IO, no wall-clock: callers pass "now".
//!
//! A session day is a weekday in the exchange's own time zone that is not a
//! listed holiday. Only full-day closures are modelled; early closes still
//! count as sessions.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;

// ---------------------------------------------------------------------------
// SessionCalendar
// ---------------------------------------------------------------------------

/// A built-in trading calendar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionCalendar {
    /// NYSE / NASDAQ: weekdays in America/New_York minus US market holidays.
    UsEquity,
    /// London Stock Exchange: weekdays in Europe/London minus England & Wales
    /// bank holidays.
    LondonEquity,
}

impl SessionCalendar {
    /// Calendar for a calendar name (`"NYSE"`, `"NASDAQ"`, `"LSE"`).
    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "NYSE" | "NASDAQ" => Some(Self::UsEquity),
            "LSE" => Some(Self::LondonEquity),
            _ => None,
        }
    }

    pub fn tz(&self) -> Tz {
        match self {
            Self::UsEquity => chrono_tz::America::New_York,
            Self::LondonEquity => chrono_tz::Europe::London,
        }
    }

    /// The exchange's local date at instant `now`.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz()).date_naive()
    }

    pub fn is_session_day(&self, date: NaiveDate) -> bool {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        !self.is_holiday(date)
    }

    /// Whether the exchange has a session on its local "today".
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.is_session_day(self.local_date(now))
    }

    /// Whether the holiday table covers `year`. Outside the covered years
    /// only weekends are treated as closed.
    pub fn covers_year(&self, year: i32) -> bool {
        let table = self.holidays();
        let first = table.first().map(|h| h.0);
        let last = table.last().map(|h| h.0);
        matches!((first, last), (Some(lo), Some(hi)) if (lo..=hi).contains(&year))
    }

    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays()
            .contains(&(date.year(), date.month(), date.day()))
    }

    fn holidays(&self) -> &'static [(i32, u32, u32)] {
        match self {
            Self::UsEquity => US_HOLIDAYS,
            Self::LondonEquity => UK_HOLIDAYS,
        }
    }
}

// ---------------------------------------------------------------------------
// Holiday tables 2023–2027 (observed dates)
// ---------------------------------------------------------------------------

const US_HOLIDAYS: &[(i32, u32, u32)] = &[
    // ── 2023 ─────────────────────────────────────────────────────────
    (2023, 1, 2),   // New Year's Day (observed Mon)
    (2023, 1, 16),  // MLK Day
    (2023, 2, 20),  // Presidents' Day
    (2023, 4, 7),   // Good Friday
    (2023, 5, 29),  // Memorial Day
    (2023, 6, 19),  // Juneteenth
    (2023, 7, 4),   // Independence Day
    (2023, 9, 4),   // Labor Day
    (2023, 11, 23), // Thanksgiving
    (2023, 12, 25), // Christmas
    // ── 2024 ─────────────────────────────────────────────────────────
    (2024, 1, 1),
    (2024, 1, 15),
    (2024, 2, 19),
    (2024, 3, 29),
    (2024, 5, 27),
    (2024, 6, 19),
    (2024, 7, 4),
    (2024, 9, 2),
    (2024, 11, 28),
    (2024, 12, 25),
    // ── 2025 ─────────────────────────────────────────────────────────
    (2025, 1, 1),
    (2025, 1, 9), // National Day of Mourning (President Carter)
    (2025, 1, 20),
    (2025, 2, 17),
    (2025, 4, 18),
    (2025, 5, 26),
    (2025, 6, 19),
    (2025, 7, 4),
    (2025, 9, 1),
    (2025, 11, 27),
    (2025, 12, 25),
    // ── 2026 ─────────────────────────────────────────────────────────
    (2026, 1, 1),
    (2026, 1, 19),
    (2026, 2, 16),
    (2026, 4, 3),
    (2026, 5, 25),
    (2026, 6, 19),
    (2026, 7, 3), // Independence Day observed (July 4 is a Saturday)
    (2026, 9, 7),
    (2026, 11, 26),
    (2026, 12, 25),
    // ── 2027 ─────────────────────────────────────────────────────────
    (2027, 1, 1),
    (2027, 1, 18),
    (2027, 2, 15),
    (2027, 3, 26),
    (2027, 5, 31),
    (2027, 6, 18), // Juneteenth observed
    (2027, 7, 5),  // Independence Day observed
    (2027, 9, 6),
    (2027, 11, 25),
    (2027, 12, 24), // Christmas observed
];

const UK_HOLIDAYS: &[(i32, u32, u32)] = &[
    // ── 2023 ─────────────────────────────────────────────────────────
    (2023, 1, 2),   // New Year's Day (substitute)
    (2023, 4, 7),   // Good Friday
    (2023, 4, 10),  // Easter Monday
    (2023, 5, 1),   // Early May
    (2023, 5, 8),   // Coronation
    (2023, 5, 29),  // Spring
    (2023, 8, 28),  // Summer
    (2023, 12, 25), // Christmas
    (2023, 12, 26), // Boxing Day
    // ── 2024 ─────────────────────────────────────────────────────────
    (2024, 1, 1),
    (2024, 3, 29),
    (2024, 4, 1),
    (2024, 5, 6),
    (2024, 5, 27),
    (2024, 8, 26),
    (2024, 12, 25),
    (2024, 12, 26),
    // ── 2025 ─────────────────────────────────────────────────────────
    (2025, 1, 1),
    (2025, 4, 18),
    (2025, 4, 21),
    (2025, 5, 5),
    (2025, 5, 26),
    (2025, 8, 25),
    (2025, 12, 25),
    (2025, 12, 26),
    // ── 2026 ─────────────────────────────────────────────────────────
    (2026, 1, 1),
    (2026, 4, 3),
    (2026, 4, 6),
    (2026, 5, 4),
    (2026, 5, 25),
    (2026, 8, 31),
    (2026, 12, 25),
    (2026, 12, 28), // Boxing Day (substitute)
    // ── 2027 ─────────────────────────────────────────────────────────
    (2027, 1, 1),
    (2027, 3, 26),
    (2027, 3, 29),
    (2027, 5, 3),
    (2027, 5, 31),
    (2027, 8, 30),
    (2027, 12, 27), // Christmas (substitute)
    (2027, 12, 28), // Boxing Day (substitute)
];

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekends_are_closed() {
        // 2024-01-06 Sat, 2024-01-07 Sun
        assert!(!SessionCalendar::UsEquity.is_session_day(d(2024, 1, 6)));
        assert!(!SessionCalendar::LondonEquity.is_session_day(d(2024, 1, 7)));
        assert!(SessionCalendar::UsEquity.is_session_day(d(2024, 1, 8)));
    }

    #[test]
    fn holidays_differ_by_market() {
        // Easter Monday: London closed, New York open.
        assert!(!SessionCalendar::LondonEquity.is_session_day(d(2024, 4, 1)));
        assert!(SessionCalendar::UsEquity.is_session_day(d(2024, 4, 1)));
        // Thanksgiving: the reverse.
        assert!(!SessionCalendar::UsEquity.is_session_day(d(2024, 11, 28)));
        assert!(SessionCalendar::LondonEquity.is_session_day(d(2024, 11, 28)));
    }

    #[test]
    fn local_date_uses_exchange_time_zone() {
        // 2024-01-02 03:00Z is still Jan 1 (a holiday) in New York.
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap();
        assert_eq!(SessionCalendar::UsEquity.local_date(now), d(2024, 1, 1));
        assert!(!SessionCalendar::UsEquity.is_open_at(now));
        // Already Jan 2 in London.
        assert!(SessionCalendar::LondonEquity.is_open_at(now));
    }

    #[test]
    fn uncovered_year_falls_back_to_weekdays() {
        assert!(SessionCalendar::UsEquity.covers_year(2026));
        assert!(!SessionCalendar::UsEquity.covers_year(2031));
        // 2031-01-01 is a Wednesday; no table entry, so treated as a session.
        assert!(SessionCalendar::UsEquity.is_session_day(d(2031, 1, 1)));
    }

    #[test]
    fn names_map_to_calendars() {
        assert_eq!(SessionCalendar::by_name("nasdaq"), Some(SessionCalendar::UsEquity));
        assert_eq!(SessionCalendar::by_name("LSE"), Some(SessionCalendar::LondonEquity));
        assert_eq!(SessionCalendar::by_name("XTSE"), None);
    }
}
