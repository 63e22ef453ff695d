//! Yahoo chart adapter against a local mock server.
//!
//! GREEN when:
//! - the request carries period1/period2/interval for the provider symbol,
//! - bars come back labelled with the stored series name,
//! - HTTP and chart-level errors surface as ProviderError, never a panic.

use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use httpmock::prelude::*;
use sdb_md::{BarProvider, BarTime, FetchRequest, Interval, ProviderError, YahooProvider};

const GBPUSD_BODY: &str = r#"{
  "chart": {
    "result": [{
      "meta": { "currency": "USD", "symbol": "GBPUSD=X", "gmtoffset": 0 },
      "timestamp": [1704153600, 1704240000],
      "indicators": {
        "quote": [{
          "open":   [1.2730, 1.2620],
          "high":   [1.2750, 1.2640],
          "low":    [1.2610, 1.2600],
          "close":  [1.2731, 1.2619],
          "volume": [0, 0]
        }],
        "adjclose": [{ "adjclose": [1.2731, 1.2619] }]
      }
    }],
    "error": null
  }
}"#;

fn provider(server: &MockServer) -> YahooProvider {
    YahooProvider::new(&server.base_url(), "sdb-test", Duration::from_secs(5)).unwrap()
}

fn request(symbol: &str) -> FetchRequest {
    FetchRequest {
        provider_symbol: symbol.to_string(),
        interval: Interval::Daily,
        start: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn forex_request_uses_provider_symbol_and_labels_with_pair() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v8/finance/chart/GBPUSD=X")
                .query_param("period1", "1704153600")
                .query_param("period2", "1704326400")
                .query_param("interval", "1d");
            then.status(200)
                .header("content-type", "application/json")
                .body(GBPUSD_BODY);
        })
        .await;

    let bars = provider(&server)
        .fetch_bars("GBP/USD", &request("GBPUSD=X"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(bars.len(), 2);
    assert!(bars.iter().all(|b| b.symbol == "GBP/USD"));
    assert_eq!(
        bars[0].time,
        BarTime::Day(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
    );
    assert_eq!(bars[1].close, 1.2619);
}

#[tokio::test]
async fn not_found_maps_to_api_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v8/finance/chart/ZZZZ");
            then.status(404)
                .header("content-type", "application/json")
                .body(r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#);
        })
        .await;

    let err = provider(&server)
        .fetch_bars("ZZZZ", &request("ZZZZ"))
        .await
        .unwrap_err();

    match err {
        ProviderError::Api { code, .. } => assert_eq!(code.as_deref(), Some("Not Found")),
        other => panic!("expected api error, got {other}"),
    }
}

#[tokio::test]
async fn non_json_error_page_keeps_http_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v8/finance/chart/AAA");
            then.status(429).body("Too Many Requests");
        })
        .await;

    let err = provider(&server)
        .fetch_bars("AAA", &request("AAA"))
        .await
        .unwrap_err();

    match err {
        ProviderError::Api { code, message } => {
            assert_eq!(code.as_deref(), Some("429"));
            assert_eq!(message, "Too Many Requests");
        }
        other => panic!("expected api error, got {other}"),
    }
}

#[tokio::test]
async fn garbage_success_body_is_a_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v8/finance/chart/AAA");
            then.status(200).body("{\"unexpected\":true}");
        })
        .await;

    let err = provider(&server)
        .fetch_bars("AAA", &request("AAA"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Decode(_)), "got {err}");
}
