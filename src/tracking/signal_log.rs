use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::strategy::TradingSignal;
use crate::tracking::verification::Resolution;

/// Append-only UTF-8 signal journal: a header block per emission, one line
/// per verification resolution. The handle is reopened if the file shrinks
/// underneath us (external truncation).
pub struct SignalLog {
    path: PathBuf,
    file: File,
    written: u64,
}

impl SignalLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating log directory {}", parent.display()))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening signal log {}", path.display()))?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            path,
            file,
            written,
        })
    }

    pub fn log_signal(&mut self, signal: &TradingSignal) -> Result<()> {
        let block = format!(
            "=== {} ===\n{}\n",
            signal.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            signal.summary()
        );
        self.append(&block)
    }

    pub fn log_resolution(&mut self, resolution: &Resolution) -> Result<()> {
        let line = format!(
            "VERIFY {} {}m predicted={} actual={:.2} entry={:.2} profit={:+.2}% {}\n",
            resolution.signal_id,
            resolution.horizon_minutes,
            resolution.direction,
            resolution.price,
            resolution.entry_price,
            resolution.profit_pct,
            resolution.outcome,
        );
        self.append(&line)
    }

    fn append(&mut self, text: &str) -> Result<()> {
        self.reopen_if_truncated()?;
        self.file
            .write_all(text.as_bytes())
            .with_context(|| format!("writing signal log {}", self.path.display()))?;
        self.file.flush().ok();
        self.written = self.file.metadata().map(|m| m.len()).unwrap_or(self.written);
        Ok(())
    }

    fn reopen_if_truncated(&mut self) -> Result<()> {
        let on_disk = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        if on_disk < self.written {
            self.file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .with_context(|| format!("reopening signal log {}", self.path.display()))?;
            self.written = on_disk;
        }
        Ok(())
    }
}
