//! Shared fixtures for passthrough integration tests.

#![allow(dead_code)]

use oxpass_core::{ListingMode, MemoryOpLog, OpLog, Passthrough, RootMapper};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// A host tree with `a.txt` ("abcd") and an empty directory `d`.
pub struct Fixture {
    pub dir: TempDir,
    pub fs: Passthrough,
    pub log: Arc<MemoryOpLog>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_listing(ListingMode::Plain)
    }

    pub fn with_listing(listing: ListingMode) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(dir.path().join("a.txt"), b"abcd").expect("Failed to write a.txt");
        fs::create_dir(dir.path().join("d")).expect("Failed to create d");

        let log = Arc::new(MemoryOpLog::new());
        let fs = Passthrough::new(
            RootMapper::new(dir.path()),
            listing,
            Arc::clone(&log) as Arc<dyn OpLog>,
        );
        Self { dir, fs, log }
    }

    /// Host path for a virtual path.
    pub fn host(&self, virtual_path: &str) -> std::path::PathBuf {
        self.fs.host_path(Path::new(virtual_path))
    }

    pub fn write(&self, virtual_path: &str, content: &[u8]) {
        fs::write(self.host(virtual_path), content).expect("Failed to write fixture file");
    }
}
