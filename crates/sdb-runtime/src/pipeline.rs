//! One parameterized refresh pipeline for every table kind.
//!
//! universe -> watermark -> fetch -> repair -> normalize -> insert -> commit
//!
//! Failure handling per table run:
//! - download failure: recorded, next series continues
//! - ticker / watermark read failure: fatal for the table
//! - row insert failure: recorded, next row continues
//! - commit failure: fatal for the table
//!
//! [`run_all`] isolates tables from each other: a fatal error in one is
//! logged and recorded, and the next table still runs.

use std::collections::BTreeSet;
use std::fmt;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use sdb_md::{normalize_batch, repair_batch, BarTime, NormalizeReport, RawBar, RepairReport, TableKind};

use crate::fetch::BarFetcher;
use crate::universe::{equity_universe, forex_universe, Series};
use crate::watermark::{fetch_bound, intraday_gap, is_up_to_date};
use crate::RefreshContext;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDownload {
    pub series: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedInsert {
    pub series: String,
    pub time: BarTime,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableReport {
    pub table: TableKind,
    /// Series considered after the calendar filter.
    pub series: usize,
    pub closed_exchanges: Vec<String>,
    pub skipped_tickers: usize,
    /// Series whose watermark is already current; no provider call made.
    pub up_to_date: usize,
    pub bars_fetched: usize,
    pub repair: RepairReport,
    pub normalize: NormalizeReport,
    pub inserted: usize,
    pub failed_downloads: Vec<FailedDownload>,
    pub failed_inserts: Vec<FailedInsert>,
    pub committed: bool,
}

impl TableReport {
    fn new(table: TableKind) -> Self {
        Self {
            table,
            series: 0,
            closed_exchanges: Vec::new(),
            skipped_tickers: 0,
            up_to_date: 0,
            bars_fetched: 0,
            repair: RepairReport::default(),
            normalize: NormalizeReport::default(),
            inserted: 0,
            failed_downloads: Vec::new(),
            failed_inserts: Vec::new(),
            committed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableOutcome {
    Completed(TableReport),
    Failed { table: TableKind, error: String },
}

impl TableOutcome {
    pub fn table(&self) -> TableKind {
        match self {
            TableOutcome::Completed(r) => r.table,
            TableOutcome::Failed { table, .. } => *table,
        }
    }

    pub fn report(&self) -> Option<&TableReport> {
        match self {
            TableOutcome::Completed(r) => Some(r),
            TableOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub outcomes: Vec<TableOutcome>,
}

impl RunSummary {
    pub fn all_ok(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o, TableOutcome::Completed(_)))
    }

    pub fn failed_tables(&self) -> Vec<TableKind> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TableOutcome::Failed { .. }))
            .map(TableOutcome::table)
            .collect()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run_id={}", self.run_id)?;
        for o in &self.outcomes {
            match o {
                TableOutcome::Completed(r) => writeln!(
                    f,
                    "table={} series={} fetched={} repaired={} inserted={} failed_downloads={} failed_inserts={} committed={}",
                    r.table,
                    r.series,
                    r.bars_fetched,
                    r.repair.repaired,
                    r.inserted,
                    r.failed_downloads.len(),
                    r.failed_inserts.len(),
                    r.committed
                )?,
                TableOutcome::Failed { table, error } => {
                    writeln!(f, "table={table} FAILED: {error}")?
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Refresh `tables` in order. Each table is isolated from the others.
pub async fn run_all(ctx: &RefreshContext, tables: &[TableKind], now: DateTime<Utc>) -> RunSummary {
    let run_id = Uuid::new_v4();
    let span = info_span!("refresh", run_id = %run_id);

    async {
        info!(tables = ?tables, provider = ctx.provider.name(), "refresh run starting");
        let mut outcomes = Vec::with_capacity(tables.len());
        for &table in tables {
            let outcome = match run_table(ctx, table, now).await {
                Ok(report) => TableOutcome::Completed(report),
                Err(e) => {
                    let msg = format!("{e:#}");
                    error!(table = %table, error = %msg, "table refresh failed");
                    TableOutcome::Failed { table, error: msg }
                }
            };
            outcomes.push(outcome);
        }
        let summary = RunSummary { run_id, outcomes };
        info!(ok = summary.all_ok(), "refresh run finished");
        summary
    }
    .instrument(span)
    .await
}

/// Refresh one table inside one transaction.
pub async fn run_table(ctx: &RefreshContext, table: TableKind, now: DateTime<Utc>) -> Result<TableReport> {
    let span = info_span!("table", table = %table);
    run_table_inner(ctx, table, now).instrument(span).await
}

async fn run_table_inner(ctx: &RefreshContext, table: TableKind, now: DateTime<Utc>) -> Result<TableReport> {
    let settings = ctx.table_settings(table);
    let mut report = TableReport::new(table);
    let mut session = ctx.store.begin(table).await?;

    let series: Vec<Series> = if table.is_forex() {
        let stored = session.forex_pairs().await?;
        forex_universe(stored, &settings.seed_pairs)
    } else {
        let tickers = session.tickers().await?;
        let universe = equity_universe(tickers, ctx.calendar.as_ref(), &ctx.config.normalize, now)
            .context("exchange calendar filter failed")?;
        report.closed_exchanges = universe.closed_exchanges;
        report.skipped_tickers = universe.skipped_tickers;
        universe.series
    };
    report.series = series.len();

    let mut fetcher = BarFetcher::new(
        ctx.provider.clone(),
        ctx.provider_timeout(),
        ctx.provider_min_interval(),
    );
    let mut batch: Vec<RawBar> = Vec::new();

    for s in &series {
        let watermark = session.watermark(&s.label).await?;
        let bound = fetch_bound(table, watermark, settings, now);
        if let Some(gap) = intraday_gap(watermark, &bound) {
            warn!(
                series = %s.label,
                bound = %bound,
                gap_days = gap.num_days(),
                "watermark older than intraday lookback; gap will not be backfilled"
            );
        }
        if is_up_to_date(&bound, now) {
            report.up_to_date += 1;
            continue;
        }

        match fetcher.fetch(table, &s.label, bound, now).await {
            Ok(bars) => {
                info!(series = %s.label, bound = %bound, bars = bars.len(), "fetched");
                batch.extend(bars);
            }
            Err(e) => {
                error!(series = %s.label, bound = %bound, error = %e, "download failed");
                report.failed_downloads.push(FailedDownload {
                    series: s.label.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    report.bars_fetched = batch.len();

    if batch.is_empty() {
        info!(
            failed_downloads = report.failed_downloads.len(),
            "no new bars; nothing to insert"
        );
        if let Err(e) = session.rollback().await {
            warn!(error = %format!("{e:#}"), "releasing read-only transaction failed");
        }
        return Ok(report);
    }

    report.repair = repair_batch(&mut batch);
    info!(
        rows = report.repair.total,
        repaired = report.repair.repaired,
        "ohlc repair done"
    );

    let minor_units: BTreeSet<String> = series
        .iter()
        .filter(|s| s.minor_units)
        .map(|s| s.label.clone())
        .collect();
    let normalized = normalize_batch(table, batch, &minor_units)?;
    report.normalize = normalized.report;

    for record in &normalized.records {
        match session.insert(record).await {
            Ok(()) => report.inserted += 1,
            Err(e) => {
                let msg = format!("{e:#}");
                error!(
                    series = record.series(),
                    date = %record.time(),
                    error = %msg,
                    "insert failed"
                );
                report.failed_inserts.push(FailedInsert {
                    series: record.series().to_string(),
                    time: record.time(),
                    error: msg,
                });
            }
        }
    }

    session.commit().await?;
    report.committed = true;

    info!(
        series = report.series,
        up_to_date = report.up_to_date,
        fetched = report.bars_fetched,
        repaired = report.repair.repaired,
        adj_close_fallbacks = report.normalize.adj_close_fallbacks,
        unit_corrected = report.normalize.unit_corrected,
        inserted = report.inserted,
        failed_downloads = report.failed_downloads.len(),
        failed_inserts = report.failed_inserts.len(),
        "table refresh committed"
    );
    Ok(report)
}
