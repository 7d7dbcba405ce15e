//! Attribute records.
//!
//! [`Attr`] is the fixed-shape record handed to the bridge. It is either a
//! verbatim copy of a host `lstat` result ([`Attr::from_metadata`]) or a
//! partial record synthesized from a directory entry ([`Attr::from_dirent`]).
//!
//! Listing-supplied records are a throughput shortcut: they carry only the
//! inode number and the file-type bits, with every other field (including
//! the device) zero. Callers must not rely on them being complete and should
//! issue an attribute query when they need more.

use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// mode_t is u16 on macOS and u32 on Linux.
#[allow(clippy::unnecessary_cast)]
const S_IFMT: u32 = libc::S_IFMT as u32;
#[allow(clippy::unnecessary_cast)]
const S_IFIFO: u32 = libc::S_IFIFO as u32;
#[allow(clippy::unnecessary_cast)]
const S_IFCHR: u32 = libc::S_IFCHR as u32;
#[allow(clippy::unnecessary_cast)]
const S_IFDIR: u32 = libc::S_IFDIR as u32;
#[allow(clippy::unnecessary_cast)]
const S_IFBLK: u32 = libc::S_IFBLK as u32;
#[allow(clippy::unnecessary_cast)]
const S_IFREG: u32 = libc::S_IFREG as u32;
#[allow(clippy::unnecessary_cast)]
const S_IFLNK: u32 = libc::S_IFLNK as u32;
#[allow(clippy::unnecessary_cast)]
const S_IFSOCK: u32 = libc::S_IFSOCK as u32;

/// Shift that moves a `d_type` value into the `S_IFMT` bits of a mode.
const DTYPE_SHIFT: u32 = 12;

/// A point in time as stored by the host: seconds and nanoseconds since the epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Seconds since the Unix epoch (negative for earlier times).
    pub secs: i64,
    /// Nanoseconds within the second, `0..1_000_000_000`.
    pub nsecs: i64,
}

impl Timestamp {
    /// Creates a timestamp from raw `stat` fields.
    pub const fn new(secs: i64, nsecs: i64) -> Self {
        Self { secs, nsecs }
    }

    /// Converts to a [`SystemTime`].
    pub fn to_system_time(self) -> SystemTime {
        let nsecs = u32::try_from(self.nsecs.clamp(0, 999_999_999)).unwrap_or(0);
        if self.secs >= 0 {
            UNIX_EPOCH + Duration::new(self.secs.unsigned_abs(), nsecs)
        } else {
            // -1.25s is stored as secs=-2, nsecs=750_000_000
            UNIX_EPOCH - Duration::from_secs(self.secs.unsigned_abs()) + Duration::new(0, nsecs)
        }
    }
}

/// Coarse file type decoded from the `S_IFMT` bits of a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Named pipe.
    Fifo,
    /// Character device.
    CharDevice,
    /// Directory.
    Directory,
    /// Block device.
    BlockDevice,
    /// Regular file.
    RegularFile,
    /// Symbolic link.
    Symlink,
    /// Unix domain socket.
    Socket,
    /// Type bits absent or unrecognised (e.g. `DT_UNKNOWN` from a listing).
    Unknown,
}

impl FileKind {
    /// Decodes the file type from a full mode value.
    pub fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFIFO => FileKind::Fifo,
            S_IFCHR => FileKind::CharDevice,
            S_IFDIR => FileKind::Directory,
            S_IFBLK => FileKind::BlockDevice,
            S_IFREG => FileKind::RegularFile,
            S_IFLNK => FileKind::Symlink,
            S_IFSOCK => FileKind::Socket,
            _ => FileKind::Unknown,
        }
    }
}

/// Attribute record for one filesystem object.
///
/// Field widths follow the widest host representation so a record built from
/// `lstat` is bit-identical to the host's answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attr {
    /// Device holding the object. Inode numbers are only unique per device.
    pub dev: u64,
    /// Host inode number.
    pub ino: u64,
    /// File type and permission bits (`st_mode`).
    pub mode: u32,
    /// Hard link count.
    pub nlink: u64,
    /// Owning user id.
    pub uid: u32,
    /// Owning group id.
    pub gid: u32,
    /// Device id for special files.
    pub rdev: u64,
    /// Size in bytes.
    pub size: u64,
    /// Preferred I/O block size.
    pub blksize: u64,
    /// Number of 512-byte blocks allocated.
    pub blocks: u64,
    /// Last access time.
    pub atime: Timestamp,
    /// Last modification time.
    pub mtime: Timestamp,
    /// Last status change time.
    pub ctime: Timestamp,
}

impl Attr {
    /// Copies every field of a host `lstat`/`stat` result.
    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
            mode: meta.mode(),
            nlink: meta.nlink(),
            uid: meta.uid(),
            gid: meta.gid(),
            rdev: meta.rdev(),
            size: meta.size(),
            blksize: meta.blksize(),
            blocks: meta.blocks(),
            atime: Timestamp::new(meta.atime(), meta.atime_nsec()),
            mtime: Timestamp::new(meta.mtime(), meta.mtime_nsec()),
            ctime: Timestamp::new(meta.ctime(), meta.ctime_nsec()),
        }
    }

    /// Synthesizes the partial record used during directory listing.
    ///
    /// Only the inode number and the type bits (`d_type << 12`) are set;
    /// permission bits and all other fields stay zero.
    pub fn from_dirent(ino: u64, d_type: u8) -> Self {
        Self {
            ino,
            mode: u32::from(d_type) << DTYPE_SHIFT,
            ..Self::default()
        }
    }

    /// Returns the file type encoded in `mode`.
    pub fn kind(&self) -> FileKind {
        FileKind::from_mode(self.mode)
    }

    /// Returns the permission bits (including setuid/setgid/sticky).
    pub fn perm(&self) -> u16 {
        // Masked to 12 bits, always fits.
        #[allow(clippy::cast_possible_truncation)]
        let perm = (self.mode & 0o7777) as u16;
        perm
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind() == FileKind::Directory
    }
}
