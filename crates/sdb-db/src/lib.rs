use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;

pub use sqlx::PgPool;

mod refresh;

pub use refresh::{PgRefreshTx, TickerRow};

pub const ENV_DB_URL: &str = "SDB_DATABASE_URL";

/// Tables the refresh job reads and writes.
pub const REQUIRED_TABLES: [&str; 4] = ["tickers", "daily", "five_minute", "daily_forex"];

/// Connect to Postgres with an explicit pool size and acquire timeout.
pub async fn connect(url: &str, max_connections: u32, connect_timeout: Duration) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(connect_timeout)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Connect to Postgres using SDB_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, 2, Duration::from_secs(10)).await
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    /// Required tables absent from the public schema (sorted).
    pub missing_tables: Vec<String>,
}

impl DbStatus {
    pub fn schema_ready(&self) -> bool {
        self.ok && self.missing_tables.is_empty()
    }
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let present: Vec<(String,)> = sqlx::query_as::<_, (String,)>(
        r#"
        select table_name::text
        from information_schema.tables
        where table_schema = 'public' and table_name = any($1)
        "#,
    )
    .bind(REQUIRED_TABLES.as_slice())
    .fetch_all(pool)
    .await
    .context("status table-exists query failed")?;

    let mut missing_tables: Vec<String> = REQUIRED_TABLES
        .iter()
        .filter(|t| !present.iter().any(|(p,)| p == *t))
        .map(|t| t.to_string())
        .collect();
    missing_tables.sort();

    Ok(DbStatus {
        ok: one == 1,
        missing_tables,
    })
}
