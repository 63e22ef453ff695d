//! Provider boundary for bar fetches.
//!
//! This module defines **only** the raw bar type, the request and the
//! provider trait. No HTTP, no DB logic, no repair or unit handling.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{BarTime, Interval};

// ---------------------------------------------------------------------------
// Raw bar
// ---------------------------------------------------------------------------

/// A single OHLCV bar as returned by an upstream provider.
///
/// `symbol` carries the stored series label (ticker or `"GBP/USD"` pair),
/// not the provider's encoding of it. Bars missing any of O/H/L/C never make
/// it past the provider adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub symbol: String,
    pub time: BarTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Split/dividend adjusted close. Absent on some young or sparse series.
    pub adj_close: Option<f64>,
    pub volume: Option<i64>,
}

// ---------------------------------------------------------------------------
// Fetch request
// ---------------------------------------------------------------------------

/// One symbol, one interval, one time window.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Symbol in the provider's own format (e.g. `"GBPUSD=X"`).
    pub provider_symbol: String,
    pub interval: Interval,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that a [`BarProvider`] implementation may return.
#[derive(Debug)]
pub enum ProviderError {
    /// Network or transport failure.
    Transport(String),
    /// The upstream API returned an application-level error.
    Api { code: Option<String>, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// The call did not finish within the configured timeout.
    Timeout { secs: u64 },
    /// The adapter could not be built (bad base URL, TLS init, ...).
    Config(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Transport(msg) => write!(f, "transport error: {msg}"),
            ProviderError::Api {
                code: Some(c),
                message,
            } => write!(f, "provider api error code={c}: {message}"),
            ProviderError::Api {
                code: None,
                message,
            } => write!(f, "provider api error: {message}"),
            ProviderError::Decode(msg) => write!(f, "decode error: {msg}"),
            ProviderError::Timeout { secs } => write!(f, "provider call timed out after {secs}s"),
            ProviderError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Upstream market-data provider contract.
///
/// Object-safe so the runtime can hold an `Arc<dyn BarProvider>`.
#[async_trait]
pub trait BarProvider: Send + Sync {
    /// Human-readable name identifying this provider (e.g. `"yahoo"`).
    fn name(&self) -> &'static str;

    /// Fetch bars for `req.provider_symbol` in `[req.start, req.end]`.
    ///
    /// `series` is the stored label written into [`RawBar::symbol`]. An
    /// empty result is not an error.
    async fn fetch_bars(&self, series: &str, req: &FetchRequest) -> Result<Vec<RawBar>, ProviderError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
