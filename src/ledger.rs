// Plain-text audit ledger: one CSV line per flush, independent of the structured store.

use chrono::SecondsFormat;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::aggregator::Flush;
use crate::models::{Category, format_value};

pub const LEDGER_HEADER: &str = "Timestamp, CPU Usage (%), Memory Usage (MB), Disk Usage (%)";

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the file with its header row if it does not exist yet.
    pub async fn ensure_header(&self) -> std::io::Result<()> {
        if tokio::fs::try_exists(&self.path).await? {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", LEDGER_HEADER).as_bytes())
            .await?;
        file.flush().await
    }

    /// Appends the flush's host averages. Returns false when the flush had none to record.
    pub async fn append(&self, flush: &Flush) -> std::io::Result<bool> {
        let Some(line) = format_line(flush) else {
            return Ok(false);
        };
        self.ensure_header().await?;
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", line).as_bytes()).await?;
        file.flush().await?;
        Ok(true)
    }
}

/// `timestamp,cpuAvg,memoryAvg,diskAvg`; a category absent from the flush is an empty field.
pub fn format_line(flush: &Flush) -> Option<String> {
    if !flush.has_system_scope() {
        return None;
    }
    let field = |c: Category| {
        flush
            .host_average(&c)
            .map(format_value)
            .unwrap_or_default()
    };
    Some(format!(
        "{},{},{},{}",
        flush.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        field(Category::Cpu),
        field(Category::Memory),
        field(Category::Disk)
    ))
}
