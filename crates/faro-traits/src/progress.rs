//! Resumable progress tracking.
//!
//! Long-running stages (fetching a universe, sweeping portfolio sizes) record
//! each completed unit of work as a key in an append-only log. A re-run reads
//! the log and skips what is already done.

use std::{
    collections::BTreeSet,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::Result;

/// An append-only record of completed work keys.
pub trait ProgressStore: Send {
    /// Whether `key` has been marked done.
    fn is_done(&self, key: &str) -> bool;

    /// Record `key` as done.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    fn mark_done(&mut self, key: &str) -> Result<()>;

    /// All completed keys, in sorted order.
    fn completed(&self) -> Vec<String>;
}

/// A progress log stored as one key per line in a text file.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    path: PathBuf,
    done: BTreeSet<String>,
}

impl FileProgressStore {
    /// Open (or create lazily) the log at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing log cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let done = if path.exists() {
            fs::read_to_string(&path)?
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            BTreeSet::new()
        };
        debug!(path = %path.display(), completed = done.len(), "Opened progress log");
        Ok(Self { path, done })
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressStore for FileProgressStore {
    fn is_done(&self, key: &str) -> bool {
        self.done.contains(key)
    }

    fn mark_done(&mut self, key: &str) -> Result<()> {
        if self.done.contains(key) {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{key}")?;
        self.done.insert(key.to_string());
        Ok(())
    }

    fn completed(&self) -> Vec<String> {
        self.done.iter().cloned().collect()
    }
}

/// An in-memory progress store, for tests and one-shot runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryProgressStore {
    done: BTreeSet<String>,
}

impl MemoryProgressStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn is_done(&self, key: &str) -> bool {
        self.done.contains(key)
    }

    fn mark_done(&mut self, key: &str) -> Result<()> {
        self.done.insert(key.to_string());
        Ok(())
    }

    fn completed(&self) -> Vec<String> {
        self.done.iter().cloned().collect()
    }
}
