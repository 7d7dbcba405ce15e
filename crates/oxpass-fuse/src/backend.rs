//! FUSE backend implementation of the `MountBackend` trait.

use crate::PassthroughFS;
use fuser::{BackgroundSession, MountOption};
use oxpass_core::PassConfig;
use oxpass_mount::{MountBackend, MountError, MountFlag, MountHandle, validate_mountpoint, validate_root};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Filesystem subtype reported in the mount table.
pub const SUBTYPE: &str = "oxpass";

/// Timeout for a graceful `session.join()` on drop before forcing unmount.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to a FUSE-mounted filesystem.
///
/// Wraps the fuser `BackgroundSession`. Dropping this handle unmounts.
pub struct FuseMountHandle {
    session: Option<BackgroundSession>,
    mountpoint: PathBuf,
}

impl std::fmt::Debug for FuseMountHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuseMountHandle")
            .field("mountpoint", &self.mountpoint)
            .field("active", &self.session.is_some())
            .finish()
    }
}

impl FuseMountHandle {
    /// Unmounts with the system tools when the session will not let go.
    fn force_unmount(&self) {
        #[cfg(target_os = "macos")]
        {
            let _ = std::process::Command::new("umount")
                .arg("-f")
                .arg(&self.mountpoint)
                .output();
        }

        #[cfg(target_os = "linux")]
        {
            let _ = std::process::Command::new("fusermount")
                .args(["-uz"])
                .arg(&self.mountpoint)
                .output();
        }
    }
}

impl MountHandle for FuseMountHandle {
    fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    fn unmount(mut self: Box<Self>) -> Result<(), MountError> {
        tracing::info!(mountpoint = %self.mountpoint.display(), "Unmounting FUSE filesystem");
        if let Some(session) = self.session.take() {
            // Blocks until the kernel lets go of the mount.
            session.join();
        }
        tracing::info!(mountpoint = %self.mountpoint.display(), "FUSE unmount successful");
        Ok(())
    }
}

impl Drop for FuseMountHandle {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        tracing::debug!("Unmounting FUSE filesystem at {}", self.mountpoint.display());

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            session.join();
            let _ = tx.send(());
        });

        if rx.recv_timeout(JOIN_TIMEOUT).is_err() {
            tracing::warn!(
                "session.join() timed out after {:?} for {}, forcing unmount",
                JOIN_TIMEOUT,
                self.mountpoint.display()
            );
            self.force_unmount();
        }
    }
}

/// FUSE-based mounting backend.
///
/// Uses the kernel FUSE module on Linux and macFUSE on macOS.
#[derive(Debug, Clone, Copy)]
pub struct FuseBackend {
    /// Timeout for waiting for mount readiness
    pub mount_timeout: Duration,
    /// Polling interval when waiting for mount
    pub poll_interval: Duration,
}

impl Default for FuseBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FuseBackend {
    /// Create a new FUSE backend with default settings.
    pub fn new() -> Self {
        Self {
            mount_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
        }
    }

    /// Create a new FUSE backend with custom timeouts.
    pub fn with_timeouts(mount_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            mount_timeout,
            poll_interval,
        }
    }

    /// Polls until the mount point's device differs from its parent's.
    fn wait_for_mount(&self, mountpoint: &Path) -> Result<(), MountError> {
        use std::os::unix::fs::MetadataExt;

        let deadline = Instant::now() + self.mount_timeout;
        let parent = mountpoint.parent().unwrap_or(Path::new("/"));

        while Instant::now() < deadline {
            if let (Ok(path_meta), Ok(parent_meta)) =
                (std::fs::metadata(mountpoint), std::fs::metadata(parent))
                && path_meta.dev() != parent_meta.dev()
            {
                tracing::debug!(
                    "FUSE mount confirmed active at {} (dev {} != parent dev {})",
                    mountpoint.display(),
                    path_meta.dev(),
                    parent_meta.dev()
                );
                return Ok(());
            }
            std::thread::sleep(self.poll_interval);
        }

        Err(MountError::Mount(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!(
                "FUSE mount did not become ready within {:?}",
                self.mount_timeout
            ),
        )))
    }

    /// Runs `spawn_mount2` on a helper thread so a mount syscall that hangs
    /// (stale mount at the mount point) cannot block the caller forever.
    fn spawn_mount_with_timeout(
        &self,
        fs: PassthroughFS,
        mountpoint: &Path,
        options: Vec<MountOption>,
    ) -> Result<BackgroundSession, MountError> {
        let mountpoint = mountpoint.to_path_buf();
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let result = fuser::spawn_mount2(fs, &mountpoint, &options);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.mount_timeout) {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(e)) => Err(MountError::Mount(e)),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(MountError::Mount(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Mount operation timed out - the mountpoint may be on a stale FUSE mount",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(MountError::Mount(
                std::io::Error::other("Mount thread terminated unexpectedly"),
            )),
        }
    }
}

impl MountBackend for FuseBackend {
    fn name(&self) -> &'static str {
        "FUSE"
    }

    fn is_available(&self) -> bool {
        #[cfg(target_os = "macos")]
        {
            Path::new("/Library/Filesystems/macfuse.fs").exists()
        }
        #[cfg(target_os = "linux")]
        {
            Path::new("/dev/fuse").exists()
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            false
        }
    }

    fn unavailable_reason(&self) -> Option<String> {
        if self.is_available() {
            return None;
        }

        #[cfg(target_os = "macos")]
        {
            Some("macFUSE is not installed. Download it from https://osxfuse.github.io/".to_string())
        }
        #[cfg(target_os = "linux")]
        {
            Some("FUSE is not available. Ensure the fuse kernel module is loaded.".to_string())
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            Some("FUSE is not supported on this platform.".to_string())
        }
    }

    fn mount(
        &self,
        config: &PassConfig,
        mountpoint: &Path,
        flags: &[MountFlag],
    ) -> Result<Box<dyn MountHandle>, MountError> {
        tracing::info!(
            root = %config.root.display(),
            mountpoint = %mountpoint.display(),
            listing = ?config.listing,
            "Starting FUSE mount"
        );

        if !self.is_available() {
            return Err(MountError::BackendUnavailable(
                self.unavailable_reason().unwrap_or_default(),
            ));
        }
        validate_root(&config.root)?;
        validate_mountpoint(mountpoint)?;

        let fs = PassthroughFS::from_config(config)?;
        let options = mount_options(config, flags);
        tracing::debug!(?options, "FUSE mount options");

        let session = self.spawn_mount_with_timeout(fs, mountpoint, options)?;
        let handle = FuseMountHandle {
            session: Some(session),
            mountpoint: mountpoint.to_path_buf(),
        };
        // On failure the handle is dropped here, which unmounts.
        self.wait_for_mount(mountpoint)?;

        tracing::info!(mountpoint = %mountpoint.display(), "FUSE mount ready");
        Ok(Box::new(handle))
    }
}

/// Maps decoded `-o` flags onto fuser options.
///
/// `fsname` defaults to `oxpass:<root>` and `subtype` to [`SUBTYPE`] unless
/// the flags name their own.
pub fn mount_options(config: &PassConfig, flags: &[MountFlag]) -> Vec<MountOption> {
    let mut options = Vec::with_capacity(flags.len() + 2);

    if !flags.iter().any(|f| matches!(f, MountFlag::FsName(_))) {
        options.push(MountOption::FSName(format!(
            "{SUBTYPE}:{}",
            config.root.display()
        )));
    }
    if !flags.iter().any(|f| matches!(f, MountFlag::Subtype(_))) {
        options.push(MountOption::Subtype(SUBTYPE.to_string()));
    }

    options.extend(flags.iter().map(|flag| match flag {
        MountFlag::ReadOnly => MountOption::RO,
        MountFlag::ReadWrite => MountOption::RW,
        MountFlag::AllowOther => MountOption::AllowOther,
        MountFlag::AllowRoot => MountOption::AllowRoot,
        MountFlag::AutoUnmount => MountOption::AutoUnmount,
        MountFlag::DefaultPermissions => MountOption::DefaultPermissions,
        MountFlag::FsName(name) => MountOption::FSName(name.clone()),
        MountFlag::Subtype(kind) => MountOption::Subtype(kind.clone()),
        MountFlag::Custom(option) => MountOption::CUSTOM(option.clone()),
    }));
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxpass_mount::parse_mount_options;

    #[test]
    fn test_default_options() {
        let config = PassConfig::with_root("/srv/data");
        let options = mount_options(&config, &[]);
        assert_eq!(
            options,
            vec![
                MountOption::FSName("oxpass:/srv/data".to_string()),
                MountOption::Subtype("oxpass".to_string()),
            ]
        );
    }

    #[test]
    fn test_flags_override_names() {
        let config = PassConfig::default();
        let flags = parse_mount_options(&["fsname=mine,subtype=other,ro"]);
        let options = mount_options(&config, &flags);
        assert_eq!(
            options,
            vec![
                MountOption::FSName("mine".to_string()),
                MountOption::Subtype("other".to_string()),
                MountOption::RO,
            ]
        );
    }

    #[test]
    fn test_flag_mapping() {
        let config = PassConfig::default();
        let flags = parse_mount_options(&[
            "rw,allow_other,allow_root,auto_unmount,default_permissions,max_read=65536",
        ]);
        let options = mount_options(&config, &flags);
        assert_eq!(
            &options[2..],
            &[
                MountOption::RW,
                MountOption::AllowOther,
                MountOption::AllowRoot,
                MountOption::AutoUnmount,
                MountOption::DefaultPermissions,
                MountOption::CUSTOM("max_read=65536".to_string()),
            ]
        );
    }

    #[test]
    fn test_unavailable_reason_matches_availability() {
        let backend = FuseBackend::new();
        assert_eq!(backend.name(), "FUSE");
        assert_eq!(backend.is_available(), backend.unavailable_reason().is_none());
    }

    #[test]
    fn test_mount_rejects_bad_root() {
        let backend = FuseBackend::new();
        if !backend.is_available() {
            return;
        }
        let dir = tempfile::TempDir::new().unwrap();
        let config = PassConfig::with_root(dir.path().join("missing"));
        let err = backend.mount(&config, dir.path(), &[]).err().expect("mount should fail");
        assert!(matches!(err, MountError::InvalidRoot { .. }));
    }
}
