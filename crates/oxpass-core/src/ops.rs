//! The operation dispatch table.
//!
//! [`Passthrough`] implements one handler per supported operation. Each
//! handler maps the virtual path through the configured [`RootMapper`],
//! appends one record to the injected [`OpLog`], performs the matching host
//! call, and returns the host's answer unchanged.
//!
//! # Operations
//!
//! | Operation | Host call | Notes |
//! |-----------|-----------|-------|
//! | getattr | `lstat` | final symlink not followed |
//! | access | `access` | mask passed through |
//! | open | `open` | same flags; `O_DIRECT` marks the handle |
//! | read | `pread` | handle wins; pathless reads open and close a descriptor |
//! | truncate | `ftruncate` / `truncate` | handle wins |
//! | readdir | `opendir`/`readdir`/`closedir` | full re-scan each call |
//! | statfs | `statvfs` | |
//! | init | - | disables kernel caching |
//! | release | `close` | consumes the handle |
//!
//! # Concurrency
//!
//! Handlers take `&self` and hold no locks of their own; `Passthrough` is
//! `Send + Sync` and may be called from any number of bridge worker threads.
//! The only shared state is read-only configuration and the log sink, which
//! serialises its own writers.

use crate::attr::Attr;
use crate::config::{ListingMode, PassConfig};
use crate::dir::{self, DirEntry, FillStatus};
use crate::error::{PassError, PassResult};
use crate::handle::FileHandle;
use crate::negotiate::MountCapabilities;
use crate::oplog::{FileOpLog, OpEvent, OpLog, OpTarget, TracingOpLog};
use crate::path::RootMapper;
use nix::errno::Errno;
use nix::sys::statvfs::statvfs;
use nix::unistd::AccessFlags;
use std::fs;
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Host filesystem statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsStats {
    /// Total data blocks, in `fragment_size` units.
    pub blocks: u64,
    /// Free blocks.
    pub blocks_free: u64,
    /// Free blocks available to unprivileged users.
    pub blocks_available: u64,
    /// Total inodes.
    pub files: u64,
    /// Free inodes.
    pub files_free: u64,
    /// Preferred block size.
    pub block_size: u64,
    /// Fundamental block size.
    pub fragment_size: u64,
    /// Maximum filename length.
    pub name_max: u64,
}

/// Passthrough filesystem adapter.
pub struct Passthrough {
    mapper: RootMapper,
    listing: ListingMode,
    log: Arc<dyn OpLog>,
}

impl std::fmt::Debug for Passthrough {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Passthrough")
            .field("root", &self.mapper.root())
            .field("listing", &self.listing)
            .finish_non_exhaustive()
    }
}

impl Passthrough {
    /// Creates an adapter with an injected log sink.
    pub fn new(mapper: RootMapper, listing: ListingMode, log: Arc<dyn OpLog>) -> Self {
        Self {
            mapper,
            listing,
            log,
        }
    }

    /// Creates an adapter from configuration.
    ///
    /// Opens the operation log file if one is configured; otherwise records
    /// go to `tracing`.
    pub fn from_config(config: &PassConfig) -> io::Result<Self> {
        let log: Arc<dyn OpLog> = match &config.log_file {
            Some(path) => Arc::new(FileOpLog::open(path)?),
            None => Arc::new(TracingOpLog),
        };
        Ok(Self::new(
            RootMapper::new(config.root.clone()),
            config.listing,
            log,
        ))
    }

    /// Returns the path mapper.
    pub fn mapper(&self) -> &RootMapper {
        &self.mapper
    }

    /// Returns the listing variant.
    pub fn listing(&self) -> ListingMode {
        self.listing
    }

    /// Returns the host path a virtual path maps to.
    pub fn host_path(&self, path: &Path) -> PathBuf {
        self.mapper.to_host(path)
    }

    fn record(&self, op: &'static str, path: &Path, fh: Option<&FileHandle>) {
        let target = match fh {
            Some(fh) => OpTarget::Handle {
                path,
                fd: fh.as_raw_fd(),
            },
            None => OpTarget::Path(path),
        };
        self.log.record(&OpEvent { op, target });
    }

    /// Mount initialisation: fixes the process-wide capabilities.
    ///
    /// Runs once before any other operation. Always succeeds and hands back
    /// no per-mount state.
    pub fn init(&self, caps: &mut MountCapabilities) {
        self.log.record(&OpEvent::bare("init"));
        caps.negotiate(self.listing);
        tracing::debug!(?caps, "mount capabilities negotiated");
    }

    /// Attribute query. Symbolic links at the final component are not followed.
    pub fn getattr(&self, path: &Path) -> PassResult<Attr> {
        self.record("getattr", path, None);
        let meta = fs::symlink_metadata(self.mapper.to_host(path))?;
        Ok(Attr::from_metadata(&meta))
    }

    /// Permission check against the host's `access(2)`.
    ///
    /// `mask` is any combination of `R_OK`, `W_OK`, `X_OK`, or `F_OK`.
    pub fn access(&self, path: &Path, mask: i32) -> PassResult<()> {
        self.record("access", path, None);
        nix::unistd::access(
            &self.mapper.to_host(path),
            AccessFlags::from_bits_truncate(mask),
        )?;
        Ok(())
    }

    /// Opens the host file with identical flags.
    ///
    /// On failure no handle is created.
    pub fn open(&self, path: &Path, flags: i32) -> PassResult<FileHandle> {
        self.record("open", path, None);
        let handle = FileHandle::open(&self.mapper.to_host(path), flags)?;
        tracing::trace!(
            path = %path.display(),
            fd = handle.as_raw_fd(),
            flags,
            direct_io = handle.flags().direct_io,
            "opened"
        );
        Ok(handle)
    }

    /// Reads up to `buf.len()` bytes at `offset`.
    ///
    /// With a handle, reads from its descriptor (the file it refers to may
    /// have been renamed or unlinked since it was opened). Without one, opens
    /// `path` read-only, reads, and closes again. Returns the number of bytes
    /// read: short at end of file, zero past it.
    pub fn read(
        &self,
        path: &Path,
        fh: Option<&FileHandle>,
        buf: &mut [u8],
        offset: u64,
    ) -> PassResult<usize> {
        self.record("read", path, fh);
        if let Some(fh) = fh {
            return Ok(fh.read_at(buf, offset)?);
        }

        let transient = FileHandle::open(&self.mapper.to_host(path), libc::O_RDONLY)?;
        let n = transient.read_at(buf, offset)?;
        Ok(n)
    }

    /// Reads up to `size` bytes at `offset` into a new buffer.
    pub fn read_vec(
        &self,
        path: &Path,
        fh: Option<&FileHandle>,
        size: usize,
        offset: u64,
    ) -> PassResult<Vec<u8>> {
        let mut buf = vec![0u8; size];
        let n = self.read(path, fh, &mut buf, offset)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Sets the file length to `len`, via the handle if one is given.
    pub fn truncate(&self, path: &Path, fh: Option<&FileHandle>, len: u64) -> PassResult<()> {
        self.record("truncate", path, fh);
        let host_len = libc::off_t::try_from(len).map_err(|_| PassError::from(Errno::EFBIG))?;
        if let Some(fh) = fh {
            fh.set_len(len)?;
        } else {
            nix::unistd::truncate(&self.mapper.to_host(path), host_len)?;
        }
        Ok(())
    }

    /// Lists a directory into `filler`.
    ///
    /// `offset` is accepted for the bridge's benefit but not honoured: every
    /// call starts again from the first host entry, so a caller resuming a
    /// partial listing sees the leading entries again. Entries come in host
    /// order, not sorted or deduplicated, with partial attributes (see
    /// [`crate::attr`]). The filler returning [`FillStatus::Full`] ends the
    /// listing without error.
    pub fn readdir<F>(&self, path: &Path, offset: i64, filler: F) -> PassResult<()>
    where
        F: FnMut(&DirEntry<'_>) -> FillStatus,
    {
        self.record("readdir", path, None);
        let accepted = dir::enumerate(&self.mapper.to_host(path), self.listing, filler)?;
        tracing::trace!(path = %path.display(), offset, accepted, "readdir done");
        Ok(())
    }

    /// Statistics for the filesystem holding `path`.
    pub fn statfs(&self, path: &Path) -> PassResult<FsStats> {
        self.record("statfs", path, None);
        let stat = statvfs(&self.mapper.to_host(path))?;

        // c_ulong is u64 on 64-bit targets; fsblkcnt_t is u32 on macOS.
        #[allow(clippy::unnecessary_cast, clippy::useless_conversion)]
        let stats = FsStats {
            blocks: u64::from(stat.blocks()),
            blocks_free: u64::from(stat.blocks_free()),
            blocks_available: u64::from(stat.blocks_available()),
            files: u64::from(stat.files()),
            files_free: u64::from(stat.files_free()),
            block_size: stat.block_size() as u64,
            fragment_size: stat.fragment_size() as u64,
            name_max: stat.name_max() as u64,
        };
        Ok(stats)
    }

    /// Releases an open handle, closing its host descriptor.
    ///
    /// The handle is consumed whether or not `close` succeeds.
    pub fn release(&self, path: &Path, fh: FileHandle) -> PassResult<()> {
        self.record("release", path, Some(&fh));
        fh.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oplog::MemoryOpLog;
    use std::time::Duration;
    use tempfile::TempDir;

    fn rooted(dir: &TempDir) -> (Passthrough, Arc<MemoryOpLog>) {
        let log = Arc::new(MemoryOpLog::new());
        let fs = Passthrough::new(
            RootMapper::new(dir.path()),
            ListingMode::Plain,
            Arc::clone(&log) as Arc<dyn OpLog>,
        );
        (fs, log)
    }

    #[test]
    fn test_every_handler_logs_once() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"abcd").unwrap();
        let (fs, log) = rooted(&dir);
        let path = Path::new("/a.txt");

        let mut caps = MountCapabilities::default();
        fs.init(&mut caps);
        fs.getattr(path).unwrap();
        fs.access(path, libc::F_OK).unwrap();
        let fh = fs.open(path, libc::O_RDONLY).unwrap();
        fs.read_vec(path, Some(&fh), 4, 0).unwrap();
        fs.readdir(Path::new("/"), 0, |_| FillStatus::Continue).unwrap();
        fs.statfs(Path::new("/")).unwrap();
        fs.release(path, fh).unwrap();

        for op in ["init", "getattr", "access", "open", "read", "readdir", "statfs", "release"] {
            assert_eq!(log.count(op), 1, "{op} should be logged exactly once");
        }
        assert!(log.lines().iter().any(|l| l.starts_with("read: fd=")));
    }

    #[test]
    fn test_failures_are_logged_too() {
        let dir = TempDir::new().unwrap();
        let (fs, log) = rooted(&dir);

        assert!(fs.getattr(Path::new("/missing")).is_err());
        assert_eq!(log.lines(), vec!["getattr: /missing".to_string()]);
    }

    #[test]
    fn test_init_disables_caching() {
        let dir = TempDir::new().unwrap();
        let (fs, _) = rooted(&dir);

        let mut caps = MountCapabilities::default();
        fs.init(&mut caps);
        assert_eq!(caps.attr_timeout, Duration::ZERO);
        assert_eq!(caps.entry_timeout, Duration::ZERO);
        assert_eq!(caps.negative_timeout, Duration::ZERO);
        assert!(caps.use_ino);
        assert!(caps.parallel_direct_writes);
    }

    #[test]
    fn test_truncate_rejects_oversized_length() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("f"), b"x").unwrap();
        let (fs, _) = rooted(&dir);

        let err = fs.truncate(Path::new("/f"), None, u64::MAX).unwrap_err();
        assert_eq!(err.to_errno(), libc::EFBIG);
    }

    #[test]
    #[allow(clippy::unnecessary_cast, clippy::useless_conversion)]
    fn test_statfs_reports_host_values() {
        let dir = TempDir::new().unwrap();
        let (fs, _) = rooted(&dir);

        let stats = fs.statfs(Path::new("/")).unwrap();
        let host = statvfs(dir.path()).unwrap();
        assert_eq!(stats.blocks, u64::from(host.blocks()));
        assert_eq!(stats.name_max, host.name_max() as u64);
        assert_eq!(stats.files, u64::from(host.files()));
        assert!(stats.block_size > 0);
    }

    #[test]
    fn test_statfs_missing_path_fails() {
        let dir = TempDir::new().unwrap();
        let (fs, _) = rooted(&dir);

        let err = fs.statfs(Path::new("/nope")).unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOENT);
    }

    #[test]
    fn test_from_config_with_log_file() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("ops.log");
        let config = PassConfig::with_root(dir.path()).log_file(&log_path);

        let fs = Passthrough::from_config(&config).unwrap();
        assert_eq!(fs.mapper().root(), dir.path());
        fs.getattr(Path::new("/")).unwrap();

        let content = fs::read_to_string(&log_path).unwrap();
        assert_eq!(content, "getattr: /\n");
    }

    #[test]
    fn test_passthrough_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Passthrough>();
        assert_send_sync::<FileHandle>();
    }
}
