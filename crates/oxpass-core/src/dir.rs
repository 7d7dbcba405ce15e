//! One-shot directory enumeration.
//!
//! [`enumerate`] opens a host directory stream, hands each entry to a filler
//! callback in host order, and closes the stream before returning on every
//! path (normal end, early stop, or error). Nothing survives between calls:
//! each listing re-scans from the first entry. The offset a bridge supplies
//! is accepted by [`Passthrough::readdir`](crate::Passthrough::readdir) but
//! not used to skip entries.
//!
//! Entries carry the partial attributes described in [`crate::attr`]; no
//! per-entry `lstat` is issued.

use crate::attr::Attr;
use crate::config::ListingMode;
use crate::error::PassResult;
use nix::dir::{Dir, Type};
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Whether the consumer can accept more entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStatus {
    /// Keep going.
    Continue,
    /// The consumer's buffer is full; stop without error.
    Full,
}

impl FillStatus {
    /// Maps the bridge convention (non-zero or `true` means full).
    pub fn from_full(full: bool) -> Self {
        if full {
            FillStatus::Full
        } else {
            FillStatus::Continue
        }
    }
}

/// One entry offered to the filler.
#[derive(Debug, Clone, Copy)]
pub struct DirEntry<'a> {
    /// Entry name as stored by the host (may not be UTF-8).
    pub name: &'a OsStr,
    /// Partial attributes: inode number and type bits only.
    pub attr: Attr,
    /// Offset hint for the bridge. Always zero: positions are not tracked.
    pub offset: i64,
    /// Listing variant the entry is offered under.
    pub mode: ListingMode,
}

/// Converts a host directory entry type to its `d_type` value.
pub fn dtype_of(file_type: Option<Type>) -> u8 {
    match file_type {
        Some(Type::Fifo) => libc::DT_FIFO,
        Some(Type::CharacterDevice) => libc::DT_CHR,
        Some(Type::Directory) => libc::DT_DIR,
        Some(Type::BlockDevice) => libc::DT_BLK,
        Some(Type::File) => libc::DT_REG,
        Some(Type::Symlink) => libc::DT_LNK,
        Some(Type::Socket) => libc::DT_SOCK,
        None => libc::DT_UNKNOWN,
    }
}

/// Enumerates `host_dir`, offering each entry to `filler`.
///
/// Returns the number of entries the filler accepted. Fails only if the
/// directory cannot be opened; a read error part-way through ends the listing
/// early, like a stream that simply runs out.
pub fn enumerate<F>(host_dir: &Path, mode: ListingMode, mut filler: F) -> PassResult<usize>
where
    F: FnMut(&DirEntry<'_>) -> FillStatus,
{
    let mut dir = Dir::open(
        host_dir,
        OFlag::O_RDONLY | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC,
        Mode::empty(),
    )?;

    let mut accepted = 0;
    for entry in dir.iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(dir = %host_dir.display(), error = %e, "readdir stopped early");
                break;
            }
        };

        let name = OsStr::from_bytes(entry.file_name().to_bytes());
        let dir_entry = DirEntry {
            name,
            attr: Attr::from_dirent(entry.ino(), dtype_of(entry.file_type())),
            offset: 0,
            mode,
        };

        if filler(&dir_entry) == FillStatus::Full {
            tracing::trace!(dir = %host_dir.display(), accepted, "filler full, stopping");
            break;
        }
        accepted += 1;
    }

    // `dir` is closed here on drop.
    Ok(accepted)
}
