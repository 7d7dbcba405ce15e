//! Test mount harness for FUSE integration tests.
//!
//! Provides `TestMount`, which mounts a passthrough view of a temporary host
//! tree and unmounts it again on drop.

// Not all tests use all TestMount methods
#![allow(dead_code)]

use fuser::{BackgroundSession, MountOption};
use oxpass_core::{ListingMode, MemoryOpLog, OpLog, Passthrough, RootMapper};
use oxpass_fuse::PassthroughFS;
use oxpass_mount::testing::TempTree;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// How long to wait for mount to become ready.
const MOUNT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait between mount readiness checks.
const MOUNT_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// A mounted passthrough view of a temporary host tree.
///
/// # Example
///
/// ```ignore
/// use common::TestMount;
///
/// #[test]
/// fn test_read() {
///     let mount = TestMount::new().unwrap();
///     assert_eq!(mount.read("a.txt").unwrap(), b"abcd");
/// }
/// ```
pub struct TestMount {
    /// The FUSE session (unmounts on drop).
    _session: BackgroundSession,
    /// Path where the tree is mounted.
    pub mount_path: PathBuf,
    /// The host tree behind the mount.
    pub tree: TempTree,
    /// Operation log the filesystem writes to.
    pub log: Arc<MemoryOpLog>,
    /// Temporary mount point directory.
    _temp_mount: TempDir,
}

impl TestMount {
    /// Mounts the reference tree with the plain listing.
    pub fn new() -> Result<Self, String> {
        Self::with_tree(TempTree::new(), ListingMode::Plain)
    }

    /// Mounts the reference tree with the extended listing.
    pub fn with_plus() -> Result<Self, String> {
        Self::with_tree(TempTree::new(), ListingMode::Plus)
    }

    /// Mounts `tree`, which must contain `a.txt` (readiness is detected by it).
    pub fn with_tree(tree: TempTree, listing: ListingMode) -> Result<Self, String> {
        let temp_mount = TempDir::new().map_err(|e| format!("Failed to create temp dir: {e}"))?;
        let mount_path = temp_mount.path().join("mnt");
        fs::create_dir(&mount_path).map_err(|e| format!("Failed to create mount point: {e}"))?;

        let log = Arc::new(MemoryOpLog::new());
        let core = Passthrough::new(
            RootMapper::new(tree.path()),
            listing,
            Arc::clone(&log) as Arc<dyn OpLog>,
        );
        let fs = PassthroughFS::new(core);

        let options = vec![
            MountOption::FSName("oxpass-test".to_string()),
            MountOption::Subtype("oxpass".to_string()),
        ];

        let session = fuser::spawn_mount2(fs, &mount_path, &options)
            .map_err(|e| format!("Failed to mount: {e}"))?;

        Self::wait_for_mount(&mount_path)?;

        Ok(Self {
            _session: session,
            mount_path,
            tree,
            log,
            _temp_mount: temp_mount,
        })
    }

    /// Waits until the reference file shows up through the mount.
    fn wait_for_mount(mount_path: &Path) -> Result<(), String> {
        let deadline = Instant::now() + MOUNT_READY_TIMEOUT;
        while Instant::now() < deadline {
            if let Ok(mut entries) = fs::read_dir(mount_path)
                && entries.any(|e| e.is_ok_and(|e| e.file_name() == "a.txt"))
            {
                return Ok(());
            }
            thread::sleep(MOUNT_CHECK_INTERVAL);
        }
        Err("Mount did not become ready in time".to_string())
    }

    // =========================================================================
    // Filesystem convenience methods
    // =========================================================================

    /// Build a full path under the mount from a relative path.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.mount_path.join(relative.trim_start_matches('/'))
    }

    /// Read a file's contents through the mount.
    pub fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.path(path))
    }

    /// Sorted entry names of a directory, as seen through the mount.
    pub fn list(&self, path: &str) -> io::Result<Vec<String>> {
        let mut names = fs::read_dir(self.path(path))?
            .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<io::Result<Vec<_>>>()?;
        names.sort();
        Ok(names)
    }

    /// `lstat` through the mount.
    pub fn metadata(&self, path: &str) -> io::Result<fs::Metadata> {
        fs::symlink_metadata(self.path(path))
    }
}

/// Check if FUSE is available on this system.
pub fn fuse_available() -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new("/dev/fuse").exists()
    }
    #[cfg(target_os = "macos")]
    {
        Path::new("/Library/Filesystems/macfuse.fs").exists()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        false
    }
}

/// Skip test if FUSE is not available.
#[macro_export]
macro_rules! skip_if_no_fuse {
    () => {
        if !$crate::common::harness::fuse_available() {
            eprintln!("Skipping test: FUSE not available on this system");
            return;
        }
    };
}

/// Skip test if mounting fails (common in CI environments).
#[macro_export]
macro_rules! require_mount {
    ($mount_result:expr) => {
        match $mount_result {
            Ok(m) => m,
            Err(e) => {
                eprintln!("Skipping test: {}", e);
                return;
            }
        }
    };
}
