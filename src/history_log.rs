//! Append-only record of every reported flavour, kept for later analysis.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Append one `dd.mm.yyyy: label` line per label.
    pub fn append(&self, day: NaiveDate, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open history log {:?}", self.path))?;

        let date = day.format("%d.%m.%Y");
        let mut buf = String::new();
        for label in labels {
            buf.push_str(&format!("{}: {}\n", date, label));
        }
        file.write_all(buf.as_bytes())
            .with_context(|| format!("Failed to append to history log {:?}", self.path))?;
        Ok(())
    }

    /// Append, logging instead of failing. History is best-effort.
    pub fn record(&self, day: NaiveDate, labels: &[String]) {
        if let Err(e) = self.append(day, labels) {
            log::warn!("History log write failed: {:#}", e);
        }
    }
}
