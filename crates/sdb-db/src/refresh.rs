//! One table's refresh transaction.
//!
//! Reads (tickers, forex pairs, watermarks) and writes (row inserts) for one
//! table run share a single transaction, committed once at the end. Each row
//! insert runs in its own savepoint so a rejected row (duplicate key, NaN in
//! a NOT NULL column, ...) leaves the outer transaction usable.
//!
//! Table and column names come from [`TableKind`], never from input data.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Connection, PgPool, Postgres, Row, Transaction};

use sdb_md::{BarTime, EquityRow, ForexRow, InsertRecord, TableKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerRow {
    pub ticker: String,
    pub exchange: String,
}

pub struct PgRefreshTx {
    table: TableKind,
    tx: Transaction<'static, Postgres>,
}

impl PgRefreshTx {
    pub async fn begin(pool: &PgPool, table: TableKind) -> Result<Self> {
        let tx = pool
            .begin()
            .await
            .with_context(|| format!("begin transaction failed table={table}"))?;
        Ok(Self { table, tx })
    }

    /// Every ticker with its exchange code, ordered by ticker.
    pub async fn tickers(&mut self) -> Result<Vec<TickerRow>> {
        let rows = sqlx::query("select ticker, exchange from tickers order by ticker")
            .fetch_all(&mut *self.tx)
            .await
            .context("load tickers failed")?;

        rows.iter()
            .map(|r| {
                Ok(TickerRow {
                    ticker: r.try_get::<String, _>("ticker").context("decode ticker")?,
                    exchange: r.try_get::<String, _>("exchange").context("decode exchange")?,
                })
            })
            .collect()
    }

    /// Distinct currency pairs already stored in `daily_forex`.
    pub async fn forex_pairs(&mut self) -> Result<Vec<String>> {
        let rows = sqlx::query("select distinct currency_pair from daily_forex order by currency_pair")
            .fetch_all(&mut *self.tx)
            .await
            .context("load forex pairs failed")?;

        rows.iter()
            .map(|r| {
                r.try_get::<String, _>("currency_pair")
                    .context("decode currency_pair")
            })
            .collect()
    }

    /// Latest stored timestamp for one series, if any.
    pub async fn watermark(&mut self, series: &str) -> Result<Option<BarTime>> {
        let sql = format!(
            "select max(date) as last from {} where {} = $1",
            self.table.table_name(),
            self.table.series_column()
        );
        let row = sqlx::query(&sql)
            .bind(series)
            .fetch_one(&mut *self.tx)
            .await
            .with_context(|| format!("watermark query failed table={} series={series}", self.table))?;

        let last = match self.table {
            TableKind::FiveMinute => row
                .try_get::<Option<DateTime<Utc>>, _>("last")
                .context("decode watermark")?
                .map(BarTime::Instant),
            TableKind::Daily | TableKind::DailyForex => row
                .try_get::<Option<NaiveDate>, _>("last")
                .context("decode watermark")?
                .map(BarTime::Day),
        };
        Ok(last)
    }

    /// Insert one record inside a savepoint. On error the savepoint is rolled
    /// back and the error returned; the transaction stays open.
    pub async fn insert(&mut self, record: &InsertRecord) -> Result<()> {
        let mut sp = self.tx.begin().await.context("savepoint failed")?;

        let res = match record {
            InsertRecord::Equity(row) => insert_equity(&mut sp, self.table, row).await,
            InsertRecord::Forex(row) => insert_forex(&mut sp, row).await,
        };

        match res {
            Ok(()) => {
                sp.commit().await.context("release savepoint failed")?;
                Ok(())
            }
            Err(e) => {
                sp.rollback().await.context("rollback to savepoint failed")?;
                Err(e)
            }
        }
    }

    pub async fn commit(self) -> Result<()> {
        let table = self.table;
        self.tx
            .commit()
            .await
            .with_context(|| format!("commit failed table={table}"))
    }

    /// Abandon the transaction. Nothing written in it survives.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.context("rollback failed")
    }
}

async fn insert_equity(
    tx: &mut Transaction<'_, Postgres>,
    table: TableKind,
    row: &EquityRow,
) -> Result<()> {
    let sql = format!(
        r#"
        insert into {} (ticker, date, open, high, low, close, adj_close, volume)
        values ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
        table.table_name()
    );
    let q = sqlx::query(&sql).bind(&row.ticker);
    let q = match row.time {
        BarTime::Day(d) => q.bind(d),
        BarTime::Instant(t) => q.bind(t),
    };
    q.bind(row.open)
        .bind(row.high)
        .bind(row.low)
        .bind(row.close)
        .bind(row.adj_close)
        .bind(row.volume)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("insert {} failed ticker={} date={}", table, row.ticker, row.time))?;
    Ok(())
}

async fn insert_forex(tx: &mut Transaction<'_, Postgres>, row: &ForexRow) -> Result<()> {
    sqlx::query(
        r#"
        insert into daily_forex (currency_pair, date, open, high, low, close)
        values ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(&row.currency_pair)
    .bind(row.date)
    .bind(row.open)
    .bind(row.high)
    .bind(row.low)
    .bind(row.close)
    .execute(&mut **tx)
    .await
    .with_context(|| {
        format!(
            "insert daily_forex failed currency_pair={} date={}",
            row.currency_pair, row.date
        )
    })?;
    Ok(())
}
