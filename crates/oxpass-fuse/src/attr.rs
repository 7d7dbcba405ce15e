//! Attribute conversion to the kernel's representation.

use fuser::{FileAttr, FileType};
use oxpass_core::{Attr, FileKind};

/// Block size reported when the host's does not fit the kernel field.
pub const BLOCK_SIZE: u32 = 4096;

/// Maps a decoded file type to the kernel's.
///
/// The kernel has no "unknown" type; entries whose type the host directory
/// stream did not report are presented as regular files until an attribute
/// query says otherwise.
pub fn file_type(kind: FileKind) -> FileType {
    match kind {
        FileKind::Fifo => FileType::NamedPipe,
        FileKind::CharDevice => FileType::CharDevice,
        FileKind::Directory => FileType::Directory,
        FileKind::BlockDevice => FileType::BlockDevice,
        FileKind::Symlink => FileType::Symlink,
        FileKind::Socket => FileType::Socket,
        FileKind::RegularFile | FileKind::Unknown => FileType::RegularFile,
    }
}

/// Builds the kernel attribute record for node `ino`.
///
/// Every field is copied from `attr`; only the node id is substituted. It
/// equals the host inode number except for the mount root
/// ([`oxpass_mount::ROOT_NODE`]) and objects whose inode number is already
/// taken by another device. Creation time is not tracked by the host and is
/// reported as the change time.
pub fn to_file_attr(ino: u64, attr: &Attr) -> FileAttr {
    let ctime = attr.ctime.to_system_time();
    // dev_t is 64 bits on Linux; the kernel protocol carries 32.
    #[allow(clippy::cast_possible_truncation)]
    let rdev = attr.rdev as u32;

    FileAttr {
        ino,
        size: attr.size,
        blocks: attr.blocks,
        atime: attr.atime.to_system_time(),
        mtime: attr.mtime.to_system_time(),
        ctime,
        crtime: ctime,
        kind: file_type(attr.kind()),
        perm: attr.perm(),
        nlink: u32::try_from(attr.nlink).unwrap_or(u32::MAX),
        uid: attr.uid,
        gid: attr.gid,
        rdev,
        blksize: u32::try_from(attr.blksize).unwrap_or(BLOCK_SIZE),
        flags: 0,
    }
}
