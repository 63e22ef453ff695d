use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use sdb_md::{BarProvider, FetchRequest, ProviderError, RawBar};

/// What the provider answers for one series.
#[derive(Debug, Clone)]
enum Script {
    Bars(Vec<RawBar>),
    Fail(String),
}

/// Fake market-data provider for tests. Answers from a per-series script and
/// records every request it receives. Unscripted series get no bars.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    scripts: Arc<Mutex<BTreeMap<String, Script>>>,
    requests: Arc<Mutex<Vec<FetchRequest>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn scripts(&self) -> MutexGuard<'_, BTreeMap<String, Script>> {
        self.scripts.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn log(&self) -> MutexGuard<'_, Vec<FetchRequest>> {
        self.requests.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn with_bars(self, series: &str, bars: Vec<RawBar>) -> Self {
        self.scripts().insert(series.to_string(), Script::Bars(bars));
        self
    }

    pub fn failing(self, series: &str, message: &str) -> Self {
        self.scripts()
            .insert(series.to_string(), Script::Fail(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.log().clone()
    }

    /// Provider symbols requested, in call order.
    pub fn requested_symbols(&self) -> Vec<String> {
        self.log().iter().map(|r| r.provider_symbol.clone()).collect()
    }
}

#[async_trait]
impl BarProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_bars(&self, series: &str, req: &FetchRequest) -> Result<Vec<RawBar>, ProviderError> {
        self.log().push(req.clone());
        match self.scripts().get(series) {
            Some(Script::Bars(bars)) => Ok(bars.clone()),
            Some(Script::Fail(msg)) => Err(ProviderError::Api {
                code: None,
                message: msg.clone(),
            }),
            None => Ok(Vec::new()),
        }
    }
}
