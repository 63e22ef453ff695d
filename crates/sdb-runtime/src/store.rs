//! Storage seam for a table run.
//!
//! The pipeline talks to [`RefreshStore`] / [`RefreshSession`] only. The
//! Postgres implementation wraps `sdb_db::PgRefreshTx`; tests use the
//! in-memory store from sdb-testkit.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use sdb_db::{PgRefreshTx, TickerRow};
use sdb_md::{BarTime, InsertRecord, TableKind};

#[async_trait]
pub trait RefreshStore: Send + Sync {
    /// Open the single transaction used for one table run.
    async fn begin(&self, table: TableKind) -> Result<Box<dyn RefreshSession>>;
}

/// Reads and writes of one table run. Dropping a session without
/// committing discards its writes.
#[async_trait]
pub trait RefreshSession: Send {
    async fn tickers(&mut self) -> Result<Vec<TickerRow>>;

    async fn forex_pairs(&mut self) -> Result<Vec<String>>;

    async fn watermark(&mut self, series: &str) -> Result<Option<BarTime>>;

    /// A failed insert must leave the session usable for the next row.
    async fn insert(&mut self, record: &InsertRecord) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshStore for PgStore {
    async fn begin(&self, table: TableKind) -> Result<Box<dyn RefreshSession>> {
        Ok(Box::new(PgRefreshTx::begin(&self.pool, table).await?))
    }
}

#[async_trait]
impl RefreshSession for PgRefreshTx {
    async fn tickers(&mut self) -> Result<Vec<TickerRow>> {
        PgRefreshTx::tickers(self).await
    }

    async fn forex_pairs(&mut self) -> Result<Vec<String>> {
        PgRefreshTx::forex_pairs(self).await
    }

    async fn watermark(&mut self, series: &str) -> Result<Option<BarTime>> {
        PgRefreshTx::watermark(self, series).await
    }

    async fn insert(&mut self, record: &InsertRecord) -> Result<()> {
        PgRefreshTx::insert(self, record).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        PgRefreshTx::commit(*self).await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        PgRefreshTx::rollback(*self).await
    }
}
