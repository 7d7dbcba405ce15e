//! Diagnostic operation log.
//!
//! Every dispatched operation appends one record naming the operation and the
//! path or handle it acted on. The log is write-only from the adapter's point
//! of view and exists for external inspection.
//!
//! The sink is injected into [`Passthrough`](crate::Passthrough) as an
//! [`OpLog`] so tests can substitute an in-memory capture. Implementations
//! must serialise concurrent writers: each record is one atomic append.

use parking_lot::Mutex;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::RawFd;
use std::path::Path;
use std::sync::Arc;

/// What an operation acted on.
#[derive(Debug, Clone, Copy)]
pub enum OpTarget<'a> {
    /// A virtual path.
    Path(&'a Path),
    /// An open handle (and the path the bridge supplied with it).
    Handle {
        /// Virtual path supplied alongside the handle.
        path: &'a Path,
        /// Host descriptor bound to the handle.
        fd: RawFd,
    },
    /// Nothing (mount initialisation).
    None,
}

/// One diagnostic record.
#[derive(Debug, Clone, Copy)]
pub struct OpEvent<'a> {
    /// Operation name, e.g. `"getattr"`.
    pub op: &'static str,
    /// What the operation acted on.
    pub target: OpTarget<'a>,
}

impl<'a> OpEvent<'a> {
    /// Record for an operation on a path.
    pub fn path(op: &'static str, path: &'a Path) -> Self {
        Self {
            op,
            target: OpTarget::Path(path),
        }
    }

    /// Record for an operation without a target.
    pub fn bare(op: &'static str) -> Self {
        Self {
            op,
            target: OpTarget::None,
        }
    }
}

impl fmt::Display for OpEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            OpTarget::Path(path) => write!(f, "{}: {}", self.op, path.display()),
            OpTarget::Handle { path, fd } => {
                write!(f, "{}: fd={} {}", self.op, fd, path.display())
            }
            OpTarget::None => write!(f, "{}", self.op),
        }
    }
}

/// Sink for diagnostic records.
pub trait OpLog: Send + Sync {
    /// Appends one record.
    fn record(&self, event: &OpEvent<'_>);
}

impl<T: OpLog + ?Sized> OpLog for Arc<T> {
    fn record(&self, event: &OpEvent<'_>) {
        (**self).record(event);
    }
}

impl<T: OpLog + ?Sized> OpLog for Box<T> {
    fn record(&self, event: &OpEvent<'_>) {
        (**self).record(event);
    }
}

/// Emits records as `tracing` events at `TRACE` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOpLog;

impl OpLog for TracingOpLog {
    fn record(&self, event: &OpEvent<'_>) {
        match event.target {
            OpTarget::Path(path) => {
                tracing::trace!(op = event.op, path = %path.display(), "dispatch");
            }
            OpTarget::Handle { path, fd } => {
                tracing::trace!(op = event.op, fd, path = %path.display(), "dispatch");
            }
            OpTarget::None => tracing::trace!(op = event.op, "dispatch"),
        }
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOpLog;

impl OpLog for NullOpLog {
    fn record(&self, _event: &OpEvent<'_>) {}
}

/// Append-only line file, one line per record.
///
/// A single mutex is held for the whole write so lines from concurrent
/// requests never interleave.
#[derive(Debug)]
pub struct FileOpLog {
    file: Mutex<File>,
}

impl FileOpLog {
    /// Opens (creating if needed) `path` for appending.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl OpLog for FileOpLog {
    fn record(&self, event: &OpEvent<'_>) {
        let line = format!("{event}\n");
        let mut file = self.file.lock();
        if let Err(e) = file.write_all(line.as_bytes()) {
            tracing::warn!(error = %e, op = event.op, "Failed to append to operation log");
        }
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryOpLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryOpLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Returns how many records have been appended.
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Counts records for one operation.
    pub fn count(&self, op: &str) -> usize {
        let prefix = format!("{op}:");
        self.lines
            .lock()
            .iter()
            .filter(|line| line.starts_with(&prefix) || line.as_str() == op)
            .count()
    }
}

impl OpLog for MemoryOpLog {
    fn record(&self, event: &OpEvent<'_>) {
        self.lines.lock().push(event.to_string());
    }
}
