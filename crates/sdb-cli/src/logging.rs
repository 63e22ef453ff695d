//! Log sinks: stderr plus one plain-text file per calendar day.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sdb_config::LoggingSettings;

/// `<dir>/<prefix>_<YYYYMMDD>.log`
pub fn log_file_path(settings: &LoggingSettings, day: NaiveDate) -> PathBuf {
    Path::new(&settings.dir).join(format!(
        "{}_{}.log",
        settings.file_prefix,
        day.format("%Y%m%d")
    ))
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
pub fn init(settings: &LoggingSettings, today: NaiveDate) -> Result<PathBuf> {
    fs::create_dir_all(&settings.dir)
        .with_context(|| format!("create log dir failed: {}", settings.dir))?;
    let path = log_file_path(settings, today);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file failed: {}", path.display()))?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(&settings.level)
            .with_context(|| format!("invalid logging.level '{}'", settings.level))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .context("install tracing subscriber failed")?;

    Ok(path)
}
