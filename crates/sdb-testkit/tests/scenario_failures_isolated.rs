//! Failure handling: per-series and per-row failures are recorded and the
//! run carries on; table-fatal failures stop only that table.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sdb_config::RefreshConfig;
use sdb_md::{InsertRecord, TableKind};
use sdb_runtime::{run_all, run_table, TableOutcome};
use sdb_testkit::{day_bar, test_context, FixedCalendar, MemStore, ScriptedProvider};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 3, 15, 0, 0).unwrap()
}

fn jan2() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

fn two_tickers() -> MemStore {
    MemStore::new().with_ticker("AAA", "NYQ").with_ticker("BBB", "NYQ")
}

#[tokio::test]
async fn download_failure_is_recorded_and_other_series_continue() {
    let store = two_tickers();
    let provider = ScriptedProvider::new()
        .failing("AAA", "No data found, symbol may be delisted")
        .with_bars("BBB", vec![day_bar("BBB", jan2(), 5.0, 6.0, 4.0, 5.0)]);
    let ctx = test_context(
        RefreshConfig::default(),
        &store,
        &provider,
        FixedCalendar::new().open("NYQ"),
    );

    let report = run_table(&ctx, TableKind::Daily, now()).await.unwrap();

    assert_eq!(report.failed_downloads.len(), 1);
    assert_eq!(report.failed_downloads[0].series, "AAA");
    assert!(report.failed_downloads[0].error.contains("delisted"));
    assert_eq!(report.inserted, 1);
    assert!(report.committed);
    assert_eq!(provider.requested_symbols(), vec!["AAA", "BBB"]);
}

#[tokio::test]
async fn insert_failure_is_recorded_and_other_rows_commit() {
    let store = two_tickers().fail_inserts_for("AAA");
    let provider = ScriptedProvider::new()
        .with_bars("AAA", vec![day_bar("AAA", jan2(), 1.0, 1.0, 1.0, 1.0)])
        .with_bars("BBB", vec![day_bar("BBB", jan2(), 5.0, 6.0, 4.0, 5.0)]);
    let ctx = test_context(
        RefreshConfig::default(),
        &store,
        &provider,
        FixedCalendar::new().open("NYQ"),
    );

    let report = run_table(&ctx, TableKind::Daily, now()).await.unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.failed_inserts.len(), 1);
    assert_eq!(report.failed_inserts[0].series, "AAA");
    assert_eq!(store.commits(TableKind::Daily), 1);
    let rows = store.rows(TableKind::Daily);
    assert_eq!(rows.iter().map(InsertRecord::series).collect::<Vec<_>>(), vec!["BBB"]);
}

#[tokio::test]
async fn duplicate_row_in_one_batch_fails_alone() {
    let store = MemStore::new().with_ticker("AAA", "NYQ");
    let provider = ScriptedProvider::new().with_bars(
        "AAA",
        vec![
            day_bar("AAA", jan2(), 1.0, 1.0, 1.0, 1.0),
            day_bar("AAA", jan2(), 1.0, 1.0, 1.0, 1.0),
        ],
    );
    let ctx = test_context(
        RefreshConfig::default(),
        &store,
        &provider,
        FixedCalendar::new().open("NYQ"),
    );

    let report = run_table(&ctx, TableKind::Daily, now()).await.unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.failed_inserts.len(), 1);
    assert!(report.committed);
}

#[tokio::test]
async fn closed_exchange_tickers_are_skipped() {
    let store = MemStore::new()
        .with_ticker("BARC.L", "LSE")
        .with_ticker("IBM", "NYQ")
        .with_ticker("BTC-USD", "CCC");
    let provider = ScriptedProvider::new();
    let ctx = test_context(
        RefreshConfig::default(),
        &store,
        &provider,
        FixedCalendar::new().closed("LSE").open("NYQ").always_open("CCC"),
    );

    let report = run_table(&ctx, TableKind::Daily, now()).await.unwrap();

    assert_eq!(report.closed_exchanges, vec!["LSE".to_string()]);
    assert_eq!(report.skipped_tickers, 1);
    assert_eq!(provider.requested_symbols(), vec!["BTC-USD", "IBM"]);
}

#[tokio::test]
async fn commit_failure_fails_its_table_only() {
    let store = MemStore::new()
        .with_ticker("AAA", "NYQ")
        .fail_commit_for(TableKind::Daily);
    let provider = ScriptedProvider::new()
        .with_bars("AAA", vec![day_bar("AAA", jan2(), 1.0, 1.0, 1.0, 1.0)])
        .with_bars("GBP/USD", vec![day_bar("GBP/USD", jan2(), 1.27, 1.28, 1.26, 1.27)]);
    let mut config = RefreshConfig::default();
    config.tables.daily_forex.seed_pairs = vec!["GBP/USD".to_string()];
    config.tables.five_minute.enabled = false;
    let ctx = test_context(config, &store, &provider, FixedCalendar::new().open("NYQ"));

    let tables = ctx.enabled_tables();
    assert_eq!(tables, vec![TableKind::Daily, TableKind::DailyForex]);
    let summary = run_all(&ctx, &tables, now()).await;

    assert!(!summary.all_ok());
    assert_eq!(summary.failed_tables(), vec![TableKind::Daily]);
    match &summary.outcomes[0] {
        TableOutcome::Failed { error, .. } => assert!(error.contains("commit failed")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(store.rows(TableKind::Daily).is_empty());
    assert_eq!(store.rows(TableKind::DailyForex).len(), 1);
    assert_eq!(summary.outcomes[1].table(), TableKind::DailyForex);
    assert!(summary.outcomes[1].report().is_some_and(|r| r.committed));
}

#[tokio::test]
async fn unknown_exchange_fails_equity_tables_but_not_forex() {
    let store = MemStore::new().with_ticker("SHOP", "TOR");
    let provider = ScriptedProvider::new()
        .with_bars("GBP/USD", vec![day_bar("GBP/USD", jan2(), 1.27, 1.28, 1.26, 1.27)]);
    let mut config = RefreshConfig::default();
    config.tables.daily_forex.seed_pairs = vec!["GBP/USD".to_string()];
    let ctx = test_context(config, &store, &provider, FixedCalendar::new());

    let summary = run_all(&ctx, &TableKind::ALL, now()).await;

    assert_eq!(
        summary.failed_tables(),
        vec![TableKind::Daily, TableKind::FiveMinute]
    );
    match &summary.outcomes[0] {
        TableOutcome::Failed { error, .. } => {
            assert!(error.contains("CALENDAR_UNKNOWN_EXCHANGE"));
            assert!(error.contains("TOR"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(provider.requested_symbols().iter().all(|s| s != "SHOP"));
    assert_eq!(store.rows(TableKind::DailyForex).len(), 1);
}

#[tokio::test]
async fn ticker_query_failure_is_fatal_for_the_table() {
    let store = MemStore::new().fail_ticker_query();
    let provider = ScriptedProvider::new();
    let ctx = test_context(RefreshConfig::default(), &store, &provider, FixedCalendar::new());

    let err = run_table(&ctx, TableKind::Daily, now()).await.unwrap_err();

    assert!(format!("{err:#}").contains("load tickers failed"));
    assert!(provider.requests().is_empty());
}
