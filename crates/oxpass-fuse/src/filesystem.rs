//! FUSE binding for the passthrough adapter.
//!
//! [`PassthroughFS`] implements the fuser `Filesystem` trait on top of
//! [`oxpass_core::Passthrough`]. The kernel speaks in node ids and handle
//! numbers; this layer turns them back into virtual paths and owned
//! [`FileHandle`]s and forwards to the path-based core.
//!
//! # Operations
//!
//! | Operation | Notes |
//! |-----------|-------|
//! | init/destroy | capabilities negotiated once; destroy closes leftover handles |
//! | lookup | host `lstat` of `parent/name`, increments nlookup |
//! | forget/batch_forget | decrements nlookup, evicts at 0, never the root |
//! | getattr | |
//! | setattr | size only (truncate); other changes answer `ENOSYS` |
//! | open/release | handle owned by the handle table in between |
//! | read | through the open handle |
//! | opendir/releasedir | stateless |
//! | readdir/readdirplus | full host re-scan, entries numbered from 1 |
//! | access | host `access(2)` |
//! | statfs | host `statvfs` |
//!
//! Every other operation keeps fuser's default `ENOSYS` reply.
//!
//! # Node ids
//!
//! Nodes are keyed by host device and inode, see [`NodeTable`]. Entries
//! listed by readdirplus carry the parent directory's device, so a mount
//! point inside the tree is first reported with the inode it covers. The
//! kernel replaces that node on the next lookup, which always goes to the
//! host.
//!
//! # Caching
//!
//! All replies use the negotiated TTLs, which are zero, so the kernel asks
//! again on every access and sees host changes immediately.

use crate::attr::{BLOCK_SIZE, file_type, to_file_attr};
use fuser::{
    FileAttr, Filesystem, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory, ReplyDirectoryPlus,
    ReplyEmpty, ReplyEntry, ReplyOpen, Request, TimeOrNow,
};
use libc::c_int;
use oxpass_core::{Attr, FileHandle, FillStatus, MountCapabilities, PassConfig, Passthrough};
use oxpass_mount::{HandleTable, HostKey, NodeTable};
use std::ffi::OsStr;
use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, trace, warn};

/// `FOPEN_PARALLEL_DIRECT_WRITES` (kernel ABI 7.38), not exported by fuser.
pub const FOPEN_PARALLEL_DIRECT_WRITES: u32 = 1 << 6;

/// An open file: the host handle and the path it was opened under.
#[derive(Debug)]
struct OpenFile {
    path: PathBuf,
    handle: FileHandle,
}

/// Passthrough filesystem for the FUSE kernel bridge.
pub struct PassthroughFS {
    /// Path-based operation table.
    core: Passthrough,
    /// Node id to virtual path map.
    nodes: NodeTable,
    /// Open files keyed by the handle number given to the kernel.
    handles: HandleTable<OpenFile>,
    /// Negotiated in `init`; defaults until then.
    caps: MountCapabilities,
}

impl std::fmt::Debug for PassthroughFS {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassthroughFS")
            .field("core", &self.core)
            .field("nodes", &self.nodes.len())
            .field("handles", &self.handles.len())
            .field("caps", &self.caps)
            .finish()
    }
}

impl PassthroughFS {
    /// Wraps an operation table.
    pub fn new(core: Passthrough) -> Self {
        Self {
            core,
            nodes: NodeTable::new(),
            handles: HandleTable::new(),
            caps: MountCapabilities::default(),
        }
    }

    /// Builds the operation table from configuration.
    pub fn from_config(config: &PassConfig) -> io::Result<Self> {
        Ok(Self::new(Passthrough::from_config(config)?))
    }

    /// The wrapped operation table.
    pub fn core(&self) -> &Passthrough {
        &self.core
    }

    /// Capabilities in effect.
    pub fn capabilities(&self) -> &MountCapabilities {
        &self.caps
    }

    /// Number of open file handles.
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    fn node_path(&self, ino: u64) -> Result<PathBuf, c_int> {
        self.nodes.path(ino).ok_or(libc::ENOENT)
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Result<PathBuf, c_int> {
        Ok(self.node_path(parent)?.join(name))
    }

    /// Resolves `parent/name` on the host and takes a kernel reference to it.
    fn lookup_child(&self, parent: u64, name: &OsStr) -> Result<(u64, Attr), c_int> {
        let path = self.child_path(parent, name)?;
        let attr = self.core.getattr(&path).map_err(|e| e.to_errno())?;
        let node = self.nodes.remember(&path, HostKey::from(&attr));
        Ok((node, attr))
    }

    /// Records the outcome of requesting `FUSE_DO_READDIRPLUS`.
    ///
    /// A kernel that refuses it only ever sends plain readdir, so the
    /// listing mode falls back to match.
    fn apply_readdir_plus<E: Debug>(&mut self, requested: Result<(), E>) {
        if let Err(unsupported) = requested {
            warn!(
                ?unsupported,
                "Kernel does not support readdirplus, falling back to plain listings"
            );
            self.caps.readdir_plus = false;
        }
    }

    fn attr_for(&self, ino: u64, path: &Path) -> Result<FileAttr, c_int> {
        let attr = self.core.getattr(path).map_err(|e| e.to_errno())?;
        Ok(to_file_attr(ino, &attr))
    }

    fn open_reply_flags(handle: &FileHandle) -> u32 {
        let flags = handle.flags();
        let mut bits = 0;
        if flags.direct_io {
            bits |= fuser::consts::FOPEN_DIRECT_IO;
        }
        if flags.parallel_direct_writes {
            bits |= FOPEN_PARALLEL_DIRECT_WRITES;
        }
        bits
    }
}

impl Filesystem for PassthroughFS {
    fn init(&mut self, _req: &Request<'_>, config: &mut KernelConfig) -> Result<(), c_int> {
        self.core.init(&mut self.caps);
        if self.caps.readdir_plus {
            let requested = config.add_capabilities(fuser::consts::FUSE_DO_READDIRPLUS);
            self.apply_readdir_plus(requested);
        }
        info!(
            root = %self.core.mapper().root().display(),
            listing = ?self.core.listing(),
            readdir_plus = self.caps.readdir_plus,
            "FUSE filesystem initialized"
        );
        Ok(())
    }

    fn destroy(&mut self) {
        let open = self.handles.len();
        if open > 0 {
            debug!(open, "Closing handles left open at unmount");
        }
        self.handles.clear();
        info!("FUSE filesystem destroyed");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        trace!(parent, name = ?name, "lookup");
        match self.lookup_child(parent, name) {
            Ok((node, attr)) => {
                reply.entry(&self.caps.entry_timeout, &to_file_attr(node, &attr), 0);
            }
            Err(errno) => reply.error(errno),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        trace!(inode = ino, nlookup, "forget");
        self.nodes.forget(ino, nlookup);
    }

    fn batch_forget(&mut self, _req: &Request<'_>, nodes: &[fuser::fuse_forget_one]) {
        trace!(count = nodes.len(), "batch_forget");
        for node in nodes {
            self.nodes.forget(node.nodeid, node.nlookup);
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        trace!(inode = ino, "getattr");
        match self.node_path(ino).and_then(|path| self.attr_for(ino, &path)) {
            Ok(attr) => reply.attr(&self.caps.attr_timeout, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    /// Only size changes are carried out, via truncate. Time updates that
    /// accompany a size change are implied by it. Mode, owner, or time
    /// changes on their own are not part of the operation set.
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        trace!(inode = ino, ?size, ?fh, "setattr");
        let path = match self.node_path(ino) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };

        if let Some(size) = size {
            let open = fh.and_then(|fh| self.handles.get(fh));
            let result = self
                .core
                .truncate(&path, open.as_deref().map(|o| &o.handle), size);
            drop(open);
            if let Err(e) = result {
                return reply.error(e.to_errno());
            }
        } else if mode.is_some()
            || uid.is_some()
            || gid.is_some()
            || atime.is_some()
            || mtime.is_some()
        {
            debug!(inode = ino, "setattr: only size changes are supported");
            return reply.error(libc::ENOSYS);
        }

        match self.attr_for(ino, &path) {
            Ok(attr) => reply.attr(&self.caps.attr_timeout, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        trace!(inode = ino, flags, "open");
        let path = match self.node_path(ino) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };

        match self.core.open(&path, flags) {
            Ok(handle) => {
                let open_flags = Self::open_reply_flags(&handle);
                let fh = self.handles.insert(OpenFile { path, handle });
                reply.opened(fh, open_flags);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!(inode = ino, fh, offset, size, "read");
        let Ok(offset) = u64::try_from(offset) else {
            return reply.error(libc::EINVAL);
        };

        let open = self.handles.get(fh);
        let path = match open.as_deref() {
            Some(open) => open.path.clone(),
            None => match self.node_path(ino) {
                Ok(path) => path,
                Err(errno) => return reply.error(errno),
            },
        };

        let result = self.core.read_vec(
            &path,
            open.as_deref().map(|o| &o.handle),
            size as usize,
            offset,
        );
        match result {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        trace!(fh, "release");
        let Some(open) = self.handles.remove(fh) else {
            // Already released or never issued.
            return reply.ok();
        };

        match self.core.release(&open.path, open.handle) {
            Ok(()) => reply.ok(),
            Err(e) => {
                warn!(fh, path = %open.path.display(), error = %e, "close failed");
                reply.error(e.to_errno());
            }
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        trace!(inode = ino, "opendir");
        if self.nodes.path(ino).is_some() {
            reply.opened(0, 0);
        } else {
            reply.error(libc::ENOENT);
        }
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    /// Entries are numbered from 1 in host order and those at or below
    /// `offset` are skipped. The host is re-scanned on every call, so the
    /// numbering is only stable while the directory is unchanged.
    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        trace!(inode = ino, offset, "readdir");
        let path = match self.node_path(ino) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };

        let mut index: i64 = 0;
        let result = self.core.readdir(&path, offset, |entry| {
            index += 1;
            if index <= offset {
                return FillStatus::Continue;
            }
            let full = reply.add(entry.attr.ino, index, file_type(entry.attr.kind()), entry.name);
            FillStatus::from_full(full)
        });

        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    /// Like [`readdir`](Self::readdir), with the listing's partial attributes
    /// attached. Each entry added (other than `.` and `..`) counts as a
    /// lookup. Dirents carry no device, so children are keyed with the
    /// directory's own, which costs one extra host `lstat` per call.
    fn readdirplus(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectoryPlus,
    ) {
        trace!(inode = ino, offset, "readdirplus");
        let path = match self.node_path(ino) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };

        let parent_dev = match self.core.getattr(&path) {
            Ok(attr) => attr.dev,
            Err(e) => return reply.error(e.to_errno()),
        };

        let ttl = self.caps.entry_timeout;
        let nodes = &self.nodes;
        let mut index: i64 = 0;
        let result = self.core.readdir(&path, offset, |entry| {
            index += 1;
            if index <= offset {
                return FillStatus::Continue;
            }

            let is_dot = entry.name == "." || entry.name == "..";
            let child = path.join(entry.name);
            let node = if is_dot {
                entry.attr.ino
            } else {
                nodes.remember(&child, HostKey::new(parent_dev, entry.attr.ino))
            };
            let attr = to_file_attr(node, &entry.attr);

            if reply.add(node, index, entry.name, &ttl, &attr, 0) {
                // Not sent, so the kernel holds no reference for it.
                if !is_dot {
                    nodes.forget(node, 1);
                }
                return FillStatus::Full;
            }
            FillStatus::Continue
        });

        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        trace!(inode = ino, mask, "access");
        let result = self
            .node_path(ino)
            .and_then(|path| self.core.access(&path, mask).map_err(|e| e.to_errno()));
        match result {
            Ok(()) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn statfs(&mut self, _req: &Request<'_>, ino: u64, reply: fuser::ReplyStatfs) {
        trace!(inode = ino, "statfs");
        let path = self.nodes.path(ino).unwrap_or_else(|| PathBuf::from("/"));

        match self.core.statfs(&path) {
            Ok(stats) => reply.statfs(
                stats.blocks,
                stats.blocks_free,
                stats.blocks_available,
                stats.files,
                stats.files_free,
                u32::try_from(stats.block_size).unwrap_or(BLOCK_SIZE),
                u32::try_from(stats.name_max).unwrap_or(255),
                u32::try_from(stats.fragment_size).unwrap_or(BLOCK_SIZE),
            ),
            Err(e) => reply.error(e.to_errno()),
        }
    }
}
