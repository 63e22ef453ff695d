use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use sdb_config::{report_unused_keys, resolve_db_secrets, RefreshConfig, UnusedKeyPolicy};
use sdb_md::TableKind;
use sdb_runtime::{calendars_from_config, run_all, yahoo_from_config, PgStore, RefreshContext};

mod logging;

#[derive(Parser)]
#[command(name = "sdb")]
#[command(about = "Incremental market-data refresh into Postgres", long_about = None)]
struct Cli {
    /// Layered config paths in merge order (repeatable). None means built-in defaults.
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    /// No subcommand refreshes every enabled table.
    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh tables (all enabled tables unless --table is given)
    Refresh {
        /// daily | five_minute | daily_forex (repeatable)
        #[arg(long = "table", value_parser = parse_table)]
        tables: Vec<TableKind>,
    },

    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

fn parse_table(s: &str) -> Result<TableKind, String> {
    TableKind::parse(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();

    if let Some(Commands::ConfigHash { paths }) = &cli.cmd {
        let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
        let loaded = sdb_config::load_layered_yaml(&path_refs)?;
        println!("config_hash={}", loaded.config_hash);
        println!("{}", loaded.canonical_json);
        return Ok(());
    }

    let path_refs: Vec<&str> = cli.config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = sdb_config::load_layered_yaml(&path_refs)?;
    let config = loaded.refresh_config()?;

    let log_path = logging::init(&config.logging, Local::now().date_naive())?;
    info!(
        config_hash = %loaded.config_hash,
        log_file = %log_path.display(),
        "sdb starting"
    );
    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for key in &unused.unused_leaf_pointers {
        warn!(key = %key, "config key is not used");
    }

    match cli.cmd {
        None => refresh(config, Vec::new()).await,
        Some(Commands::Refresh { tables }) => refresh(config, tables).await,
        Some(Commands::Db { cmd }) => {
            let pool = connect(&config).await?;
            match cmd {
                DbCmd::Status => {
                    let s = sdb_db::status(&pool).await?;
                    println!(
                        "db_ok={} schema_ready={} missing_tables={}",
                        s.ok,
                        s.schema_ready(),
                        s.missing_tables.join(",")
                    );
                }
                DbCmd::Migrate => {
                    sdb_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
            Ok(())
        }
        Some(Commands::ConfigHash { .. }) => Ok(()),
    }
}

async fn connect(config: &RefreshConfig) -> Result<sdb_db::PgPool> {
    let secrets = resolve_db_secrets(&config.db)?;
    sdb_db::connect(
        &secrets.database_url,
        config.db.max_connections,
        Duration::from_secs(config.db.connect_timeout_secs),
    )
    .await
}

async fn refresh(config: RefreshConfig, tables: Vec<TableKind>) -> Result<()> {
    let pool = connect(&config).await?;
    let status = sdb_db::status(&pool).await?;
    if !status.schema_ready() {
        bail!(
            "schema not ready, missing tables: {}. Run: `sdb db migrate`",
            status.missing_tables.join(",")
        );
    }

    let provider = yahoo_from_config(&config.provider)?;
    let calendar = calendars_from_config(&config.calendar);
    let ctx = RefreshContext {
        store: Arc::new(PgStore::new(pool)),
        provider: Arc::new(provider),
        calendar: Arc::new(calendar),
        config,
    };

    let tables = if tables.is_empty() {
        ctx.enabled_tables()
    } else {
        tables
    };

    let summary = run_all(&ctx, &tables, Utc::now()).await;
    print!("{summary}");

    let failed = summary.failed_tables();
    if !failed.is_empty() {
        let names: Vec<String> = failed.iter().map(|t| t.to_string()).collect();
        bail!("refresh failed for table(s): {}", names.join(","));
    }
    Ok(())
}
