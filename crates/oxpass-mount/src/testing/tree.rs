//! Temporary host trees.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Content of `a.txt` in the reference tree.
pub const REFERENCE_CONTENT: &[u8] = b"abcd";

/// A temporary host directory, removed on drop.
///
/// [`TempTree::new`] seeds it with `a.txt` (holding [`REFERENCE_CONTENT`])
/// and an empty directory `d`.
#[derive(Debug)]
pub struct TempTree {
    dir: TempDir,
}

impl TempTree {
    /// Creates the reference tree.
    pub fn new() -> Self {
        let tree = Self::empty();
        tree.write("a.txt", REFERENCE_CONTENT);
        tree.mkdir("d");
        tree
    }

    /// Creates an empty tree.
    pub fn empty() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        Self { dir }
    }

    /// Root of the tree on the host.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Host path of `rel` inside the tree.
    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Writes `content` to `rel`, creating parent directories.
    pub fn write(&self, rel: impl AsRef<Path>, content: &[u8]) -> PathBuf {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Creates directory `rel` and any missing parents.
    pub fn mkdir(&self, rel: impl AsRef<Path>) -> PathBuf {
        let path = self.join(rel);
        fs::create_dir_all(&path).expect("Failed to create directory");
        path
    }
}

impl Default for TempTree {
    fn default() -> Self {
        Self::new()
    }
}
