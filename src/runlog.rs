use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::time::now_iso;

/// Append-only audit log for one migration run. Every attempt lands both on
/// stdout and in a durable file named by the run's start timestamp, each
/// line shaped `[<ISO-8601 timestamp>] <message>`.
///
/// Opened once before the first phase and closed after the last one (or
/// after a fatal error) so no buffered line is lost.
#[derive(Debug)]
pub struct RunLogger {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl RunLogger {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("create log directory {}", dir.display()))?;
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let path = dir.join(format!("migration-{stamp}.log"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open run log {}", path.display()))?;
        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file sink sits behind a mutex, so concurrent callers cannot
    /// interleave partial lines.
    pub fn log(&self, message: &str) {
        let line = format!("[{}] {}", now_iso(), message);
        println!("{line}");
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = writeln!(file, "{line}") {
            eprintln!("run log write failed: {err}");
        }
    }

    /// Flush and sync the file sink. Call after the last phase or on the
    /// fatal path; the process may exit immediately afterwards.
    pub fn close(&self) -> Result<()> {
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        file.flush().context("flush run log")?;
        file.get_ref().sync_all().context("sync run log")?;
        Ok(())
    }
}
