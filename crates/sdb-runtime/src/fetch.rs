//! Bar fetcher: one provider call per series, sequential and paced.
//!
//! Every call has a hard timeout and consecutive calls are spaced by at least
//! `min_interval`. Bars at or before the fetch bound are dropped here.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::debug;

use sdb_md::{BarProvider, FetchBound, FetchRequest, Interval, ProviderError, RawBar, TableKind};

/// Daily bars can be stamped before UTC midnight of their trading date (a
/// London midnight in summer is 23:00Z), so daily requests reach back this
/// far and rely on the bound filter.
const DAILY_REQUEST_SLACK_DAYS: i64 = 1;

pub struct BarFetcher {
    provider: Arc<dyn BarProvider>,
    timeout: Duration,
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl BarFetcher {
    pub fn new(provider: Arc<dyn BarProvider>, timeout: Duration, min_interval: Duration) -> Self {
        Self {
            provider,
            timeout,
            min_interval,
            last_call: None,
        }
    }

    /// Bars for `series` strictly past `bound`, up to `now`.
    pub async fn fetch(
        &mut self,
        table: TableKind,
        series: &str,
        bound: FetchBound,
        now: DateTime<Utc>,
    ) -> Result<Vec<RawBar>, ProviderError> {
        let provider_symbol = table
            .provider_symbol(series)
            .map_err(|e| ProviderError::Config(e.to_string()))?;

        let interval = table.interval();
        let start = match interval {
            Interval::Daily => bound.request_start() - chrono::Duration::days(DAILY_REQUEST_SLACK_DAYS),
            Interval::FiveMinute => bound.request_start(),
        };
        let req = FetchRequest {
            provider_symbol,
            interval,
            start,
            end: now,
        };

        self.pace().await;
        let res = tokio::time::timeout(self.timeout, self.provider.fetch_bars(series, &req)).await;
        self.last_call = Some(Instant::now());

        let bars = match res {
            Ok(r) => r?,
            Err(_) => {
                return Err(ProviderError::Timeout {
                    secs: self.timeout.as_secs(),
                })
            }
        };

        let returned = bars.len();
        let kept: Vec<RawBar> = bars.into_iter().filter(|b| bound.admits(&b.time)).collect();
        if kept.len() < returned {
            debug!(
                series,
                dropped = returned - kept.len(),
                bound = %bound,
                "dropped bars at or before the fetch bound"
            );
        }
        Ok(kept)
    }

    async fn pace(&self) {
        if let Some(last) = self.last_call {
            tokio::time::sleep_until(last + self.min_interval).await;
        }
    }
}
