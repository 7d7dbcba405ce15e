//! Mount backend abstraction.
//!
//! - [`MountBackend`]: a mounting mechanism (currently FUSE)
//! - [`MountHandle`]: a live mount; dropping it unmounts
//!
//! ```ignore
//! use oxpass_mount::MountBackend;
//!
//! let backend = oxpass_fuse::FuseBackend::new();
//! let handle = backend.mount(&config, Path::new("/mnt/pass"), &flags)?;
//! // ... use the mounted filesystem ...
//! handle.unmount()?;
//! ```

use crate::args::MountFlag;
use oxpass_core::PassConfig;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while mounting or unmounting.
#[derive(Error, Debug)]
pub enum MountError {
    /// The physical root cannot be used (missing or not a directory).
    #[error("Invalid root {path}: {reason}")]
    InvalidRoot {
        /// The configured root.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// OS-level mount operation failed.
    #[error("Failed to mount: {0}")]
    Mount(#[from] io::Error),

    /// The mount point doesn't exist.
    #[error("Mount point does not exist: {0}")]
    MountPointNotFound(PathBuf),

    /// The mount point exists but is not a directory.
    #[error("Mount point is not a directory: {0}")]
    MountPointNotDirectory(PathBuf),

    /// The backend is not available on this system.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// Unmount failed.
    #[error("Unmount failed: {0}")]
    UnmountFailed(String),
}

/// A handle to a mounted filesystem.
///
/// Implementations must unmount on drop even if [`unmount`](Self::unmount)
/// was never called.
pub trait MountHandle: Send {
    /// Where the filesystem is mounted.
    fn mountpoint(&self) -> &Path;

    /// Unmounts the filesystem and waits for the session to end.
    fn unmount(self: Box<Self>) -> Result<(), MountError>;
}

/// A mechanism that can mount the passthrough filesystem.
pub trait MountBackend: Send + Sync {
    /// Human-readable name, e.g. `"FUSE"`.
    fn name(&self) -> &'static str;

    /// Checks that the kernel side of the bridge is present.
    fn is_available(&self) -> bool;

    /// Why the backend is unavailable, or `None` if it is available.
    fn unavailable_reason(&self) -> Option<String>;

    /// Mounts a passthrough view of `config.root` at `mountpoint`.
    fn mount(
        &self,
        config: &PassConfig,
        mountpoint: &Path,
        flags: &[MountFlag],
    ) -> Result<Box<dyn MountHandle>, MountError>;
}

/// Checks that `mountpoint` exists and is a directory.
pub fn validate_mountpoint(mountpoint: &Path) -> Result<(), MountError> {
    match std::fs::metadata(mountpoint) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(MountError::MountPointNotDirectory(mountpoint.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(MountError::MountPointNotFound(mountpoint.to_path_buf()))
        }
        Err(e) => Err(MountError::Mount(e)),
    }
}

/// Checks that the physical root is a directory.
pub fn validate_root(root: &Path) -> Result<(), MountError> {
    let invalid = |reason: String| MountError::InvalidRoot {
        path: root.to_path_buf(),
        reason,
    };
    let meta = std::fs::metadata(root).map_err(|e| invalid(e.to_string()))?;
    if !meta.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }
    Ok(())
}
