//! Yahoo Finance v8 chart adapter.
//!
//! One GET per symbol: `/v8/finance/chart/{symbol}?period1&period2&interval`.
//! Daily bars are dated in the exchange's local offset (`meta.gmtoffset`) so
//! a London midnight bar does not land on the previous UTC day; intraday bars
//! keep their UTC instant.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tracing::debug;

use crate::provider::{BarProvider, FetchRequest, ProviderError, RawBar};
use crate::{BarTime, Interval};

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Longest response excerpt carried into an error message.
const ERROR_BODY_EXCERPT: usize = 200;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct YahooProvider {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl YahooProvider {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ProviderError::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!("{}/v8/finance/chart/{}", self.base_url, symbol)
    }
}

#[async_trait]
impl BarProvider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_bars(&self, series: &str, req: &FetchRequest) -> Result<Vec<RawBar>, ProviderError> {
        let period1 = req.start.timestamp().to_string();
        let period2 = req.end.timestamp().to_string();

        let resp = self
            .http
            .get(self.chart_url(&req.provider_symbol))
            .query(&[
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("interval", req.interval.as_str()),
                ("includeAdjustedClose", "true"),
            ])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.transport_error(e))?;

        let body: ChartResponse = match serde_json::from_str(&text) {
            Ok(b) => b,
            Err(_) if !status.is_success() => {
                return Err(ProviderError::Api {
                    code: Some(status.as_u16().to_string()),
                    message: excerpt(&text),
                })
            }
            Err(e) => return Err(ProviderError::Decode(format!("chart json: {e}"))),
        };

        parse_chart(series, req.interval, body)
    }
}

impl YahooProvider {
    fn transport_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(ERROR_BODY_EXCERPT).collect()
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn parse_chart(series: &str, interval: Interval, resp: ChartResponse) -> Result<Vec<RawBar>, ProviderError> {
    if let Some(err) = resp.chart.error {
        return Err(ProviderError::Api {
            code: Some(err.code),
            message: err.description,
        });
    }

    let data = resp
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ProviderError::Decode("empty chart result with no error".to_string()))?;

    // No timestamps means no bars in the window.
    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };

    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let mut bars = Vec::with_capacity(timestamps.len());
    let mut incomplete = 0usize;

    for (i, &ts) in timestamps.iter().enumerate() {
        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();
        let adj_close = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());

        let (Some(open), Some(high), Some(low), Some(close)) = (open, high, low, close) else {
            // All-null rows are non-trading placeholders; anything else is a gap.
            if open.is_some() || high.is_some() || low.is_some() || close.is_some() {
                incomplete += 1;
            }
            continue;
        };

        let time = bar_time(interval, ts, data.meta.gmtoffset)
            .ok_or_else(|| ProviderError::Decode(format!("invalid timestamp: {ts}")))?;

        bars.push(RawBar {
            symbol: series.to_string(),
            time,
            open,
            high,
            low,
            close,
            adj_close,
            volume: volume.map(|v| v.round() as i64),
        });
    }

    if incomplete > 0 {
        debug!(series, incomplete, "dropped bars with partial OHLC");
    }

    Ok(bars)
}

fn bar_time(interval: Interval, ts: i64, gmtoffset: i64) -> Option<BarTime> {
    match interval {
        Interval::FiveMinute => DateTime::from_timestamp(ts, 0).map(BarTime::Instant),
        Interval::Daily => {
            DateTime::from_timestamp(ts + gmtoffset, 0).map(|dt| BarTime::Day(dt.date_naive()))
        }
    }
}

// -----------------
// Tests (no network)
// -----------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn parse(interval: Interval, json: &str) -> Result<Vec<RawBar>, ProviderError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        parse_chart("AAA", interval, resp)
    }

    #[test]
    fn london_midnight_bar_keeps_local_date() {
        // 2024-06-02T23:00:00Z is 2024-06-03 00:00 BST.
        let json = r#"{"chart":{"result":[{"meta":{"gmtoffset":3600},
            "timestamp":[1717369200],
            "indicators":{"quote":[{"open":[1.27],"high":[1.28],"low":[1.26],"close":[1.275],"volume":[0]}]}}],
            "error":null}}"#;
        let bars = parse(Interval::Daily, json).unwrap();
        assert_eq!(bars[0].time, BarTime::Day(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()));
        assert_eq!(bars[0].adj_close, None);
    }

    #[test]
    fn intraday_bar_is_a_utc_instant() {
        let json = r#"{"chart":{"result":[{"meta":{"gmtoffset":-14400},
            "timestamp":[1709323200],
            "indicators":{"quote":[{"open":[10.0],"high":[10.5],"low":[9.5],"close":[10.2],"volume":[1200]}]}}],
            "error":null}}"#;
        let bars = parse(Interval::FiveMinute, json).unwrap();
        assert_eq!(
            bars[0].time,
            BarTime::Instant(Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap())
        );
        assert_eq!(bars[0].volume, Some(1200));
    }

    #[test]
    fn null_and_partial_rows_are_skipped() {
        let json = r#"{"chart":{"result":[{"meta":{"gmtoffset":0},
            "timestamp":[1704186000,1704272400,1704358800],
            "indicators":{"quote":[{"open":[null,12.0,1.0],"high":[null,null,2.0],"low":[null,9.0,0.5],"close":[null,11.0,1.5],"volume":[null,10,20]}],
            "adjclose":[{"adjclose":[null,11.0,1.4]}]}}],
            "error":null}}"#;
        let bars = parse(Interval::Daily, json).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].adj_close, Some(1.4));
    }

    #[test]
    fn missing_timestamps_mean_no_bars() {
        let json = r#"{"chart":{"result":[{"meta":{"gmtoffset":0},"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(parse(Interval::Daily, json).unwrap().is_empty());
    }

    #[test]
    fn chart_error_becomes_api_error() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        match parse(Interval::Daily, json) {
            Err(ProviderError::Api { code, message }) => {
                assert_eq!(code.as_deref(), Some("Not Found"));
                assert!(message.contains("delisted"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }
}
