use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;

use sdb_db::TickerRow;
use sdb_md::{BarTime, InsertRecord, TableKind};
use sdb_runtime::{RefreshSession, RefreshStore};

/// In-memory stand-in for Postgres, used ONLY by tests.
///
/// Rows written in a session become visible only after commit. A session
/// dropped or rolled back discards its pending rows. The primary key is
/// (table, series, time), like the real schema.
#[derive(Clone, Default)]
pub struct MemStore {
    state: Arc<Mutex<MemState>>,
}

#[derive(Default)]
struct MemState {
    tickers: Vec<TickerRow>,
    rows: BTreeMap<TableKind, BTreeMap<(String, BarTime), InsertRecord>>,
    fail_insert_series: BTreeSet<String>,
    fail_tickers: bool,
    fail_commit: BTreeSet<TableKind>,
    commits: BTreeMap<TableKind, usize>,
    rollbacks: BTreeMap<TableKind, usize>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemState> {
        // A panic in another test thread poisons the lock; the data is still usable.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn with_ticker(self, ticker: &str, exchange: &str) -> Self {
        self.lock().tickers.push(TickerRow {
            ticker: ticker.to_string(),
            exchange: exchange.to_string(),
        });
        self
    }

    /// Pre-load a committed row (an existing watermark).
    pub fn with_row(self, table: TableKind, record: InsertRecord) -> Self {
        let key = (record.series().to_string(), record.time());
        self.lock().rows.entry(table).or_default().insert(key, record);
        self
    }

    /// Every insert for `series` fails.
    pub fn fail_inserts_for(self, series: &str) -> Self {
        self.lock().fail_insert_series.insert(series.to_string());
        self
    }

    /// The ticker query fails.
    pub fn fail_ticker_query(self) -> Self {
        self.lock().fail_tickers = true;
        self
    }

    pub fn fail_commit_for(self, table: TableKind) -> Self {
        self.lock().fail_commit.insert(table);
        self
    }

    /// Committed rows of `table`, ordered by (series, time).
    pub fn rows(&self, table: TableKind) -> Vec<InsertRecord> {
        self.lock()
            .rows
            .get(&table)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn commits(&self, table: TableKind) -> usize {
        self.lock().commits.get(&table).copied().unwrap_or(0)
    }

    pub fn rollbacks(&self, table: TableKind) -> usize {
        self.lock().rollbacks.get(&table).copied().unwrap_or(0)
    }
}

#[async_trait]
impl RefreshStore for MemStore {
    async fn begin(&self, table: TableKind) -> Result<Box<dyn RefreshSession>> {
        Ok(Box::new(MemSession {
            store: self.clone(),
            table,
            pending: BTreeMap::new(),
        }))
    }
}

struct MemSession {
    store: MemStore,
    table: TableKind,
    pending: BTreeMap<(String, BarTime), InsertRecord>,
}

#[async_trait]
impl RefreshSession for MemSession {
    async fn tickers(&mut self) -> Result<Vec<TickerRow>> {
        let st = self.store.lock();
        if st.fail_tickers {
            bail!("load tickers failed: injected");
        }
        let mut out = st.tickers.clone();
        out.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(out)
    }

    async fn forex_pairs(&mut self) -> Result<Vec<String>> {
        let st = self.store.lock();
        let pairs: BTreeSet<String> = st
            .rows
            .get(&TableKind::DailyForex)
            .map(|m| m.keys().map(|(s, _)| s.clone()).collect())
            .unwrap_or_default();
        Ok(pairs.into_iter().collect())
    }

    async fn watermark(&mut self, series: &str) -> Result<Option<BarTime>> {
        let st = self.store.lock();
        Ok(st.rows.get(&self.table).and_then(|m| {
            m.keys()
                .filter(|(s, _)| s == series)
                .map(|(_, t)| *t)
                .max()
        }))
    }

    async fn insert(&mut self, record: &InsertRecord) -> Result<()> {
        let key = (record.series().to_string(), record.time());
        {
            let st = self.store.lock();
            if st.fail_insert_series.contains(record.series()) {
                bail!("insert {} failed series={}: injected", self.table, key.0);
            }
            let committed = st
                .rows
                .get(&self.table)
                .is_some_and(|m| m.contains_key(&key));
            if committed {
                bail!("duplicate key table={} series={} time={}", self.table, key.0, key.1);
            }
        }
        if self.pending.contains_key(&key) {
            bail!("duplicate key table={} series={} time={}", self.table, key.0, key.1);
        }
        self.pending.insert(key, record.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemSession {
            store,
            table,
            pending,
        } = *self;
        let mut st = store.lock();
        if st.fail_commit.contains(&table) {
            bail!("commit failed table={table}: injected");
        }
        st.rows.entry(table).or_default().extend(pending);
        *st.commits.entry(table).or_default() += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut st = self.store.lock();
        *st.rollbacks.entry(self.table).or_default() += 1;
        Ok(())
    }
}
