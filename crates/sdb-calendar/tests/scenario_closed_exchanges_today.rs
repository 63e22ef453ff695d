//! Which exchanges are closed "today".
//!
//! Reference dates:
//!   2024-12-25 Wed: Christmas, both US and UK closed
//!   2024-12-26 Thu: Boxing Day, UK closed, US open
//!   2024-11-28 Thu: Thanksgiving, US closed, UK open
//!   2024-07-04 Thu 23:30 ET = 2024-07-05T03:30Z: still July 4 in New York

use chrono::{TimeZone, Utc};
use sdb_calendar::{closed_exchanges, CalendarError, ExchangeCalendars};
use std::collections::BTreeSet;

fn calendars() -> ExchangeCalendars {
    ExchangeCalendars::new(
        [
            ("NYQ", "NYSE"),
            ("NMS", "NASDAQ"),
            ("LSE", "LSE"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string())),
        ["CCC".to_string()],
    )
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const ALL: [&str; 4] = ["CCC", "LSE", "NMS", "NYQ"];

#[test]
fn christmas_closes_every_equity_exchange() {
    let now = Utc.with_ymd_and_hms(2024, 12, 25, 12, 0, 0).unwrap();
    let closed = closed_exchanges(&calendars(), ALL, now).unwrap();
    assert_eq!(closed, set(&["LSE", "NMS", "NYQ"]));
}

#[test]
fn boxing_day_closes_only_london() {
    let now = Utc.with_ymd_and_hms(2024, 12, 26, 12, 0, 0).unwrap();
    let closed = closed_exchanges(&calendars(), ALL, now).unwrap();
    assert_eq!(closed, set(&["LSE"]));
}

#[test]
fn thanksgiving_closes_only_us() {
    let now = Utc.with_ymd_and_hms(2024, 11, 28, 15, 0, 0).unwrap();
    let closed = closed_exchanges(&calendars(), ALL, now).unwrap();
    assert_eq!(closed, set(&["NMS", "NYQ"]));
}

#[test]
fn today_is_evaluated_in_exchange_local_time() {
    let now = Utc.with_ymd_and_hms(2024, 7, 5, 3, 30, 0).unwrap();
    let closed = closed_exchanges(&calendars(), ["NYQ", "LSE"], now).unwrap();
    assert_eq!(closed, set(&["NYQ"]));
}

#[test]
fn ordinary_weekday_closes_nothing() {
    let now = Utc.with_ymd_and_hms(2024, 1, 8, 15, 0, 0).unwrap();
    let closed = closed_exchanges(&calendars(), ALL, now).unwrap();
    assert!(closed.is_empty());
}

#[test]
fn unknown_code_aborts_the_evaluation() {
    let now = Utc.with_ymd_and_hms(2024, 1, 8, 15, 0, 0).unwrap();
    let err = closed_exchanges(&calendars(), ["NYQ", "TSX"], now).unwrap_err();
    assert_eq!(
        err,
        CalendarError::UnknownExchange {
            code: "TSX".to_string()
        }
    );
}
