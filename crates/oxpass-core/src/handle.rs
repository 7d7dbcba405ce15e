//! Open file handles.
//!
//! A [`FileHandle`] binds one open virtual file to exactly one host
//! descriptor. It owns the descriptor: dropping the handle closes it, so every
//! exit path (release, error, unmount) returns the descriptor to the host.
//!
//! The core keeps no table of handles. The bridge owns each handle between
//! `open` and `release` and hands it back on every call in between.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, RawFd};
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::Path;

#[cfg(target_os = "linux")]
const O_DIRECT: i32 = libc::O_DIRECT;
// macOS has no O_DIRECT flag (unbuffered I/O is F_NOCACHE via fcntl).
#[cfg(not(target_os = "linux"))]
const O_DIRECT: i32 = 0;

/// Adapter-chosen flags reported to the bridge alongside a handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleFlags {
    /// Bypass the kernel page cache for this open file.
    pub direct_io: bool,
    /// Allow concurrent direct writes to the same file.
    pub parallel_direct_writes: bool,
}

impl HandleFlags {
    /// Derives handle flags from the flags passed to `open`.
    ///
    /// An `O_DIRECT` open is marked for unbuffered I/O with overlapping
    /// direct writes allowed.
    pub fn for_open_flags(flags: i32) -> Self {
        if O_DIRECT != 0 && flags & O_DIRECT != 0 {
            Self {
                direct_io: true,
                parallel_direct_writes: true,
            }
        } else {
            Self::default()
        }
    }
}

/// An open host file.
#[derive(Debug)]
pub struct FileHandle {
    file: File,
    flags: HandleFlags,
    open_flags: i32,
}

impl FileHandle {
    /// Opens `host_path` with the given `open(2)` flags.
    ///
    /// The access mode and every other flag bit are passed to the host
    /// unchanged (`O_CLOEXEC` is always added).
    pub fn open(host_path: &Path, flags: i32) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        match flags & libc::O_ACCMODE {
            libc::O_WRONLY => {
                options.write(true);
            }
            libc::O_RDWR => {
                options.read(true).write(true);
            }
            _ => {
                options.read(true);
            }
        }
        options.custom_flags(flags & !libc::O_ACCMODE);

        let file = options.open(host_path)?;
        Ok(Self {
            file,
            flags: HandleFlags::for_open_flags(flags),
            open_flags: flags,
        })
    }

    /// Returns the flags reported to the bridge.
    pub fn flags(&self) -> HandleFlags {
        self.flags
    }

    /// Returns the flags this handle was opened with.
    pub fn open_flags(&self) -> i32 {
        self.open_flags
    }

    /// Positioned read into `buf` starting at `offset`.
    ///
    /// Returns the number of bytes read, which is less than `buf.len()` at end
    /// of file and zero past it. Does not move any shared file position, so
    /// concurrent reads on one handle are safe.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.file.read_at(buf, offset)
    }

    /// Truncates or extends the open file to `len` bytes.
    pub fn set_len(&self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }

    /// Returns the underlying file.
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Closes the descriptor, reporting the host's `close(2)` result.
    ///
    /// Dropping a handle also closes it but discards any error.
    pub fn close(self) -> io::Result<()> {
        let fd = self.file.into_raw_fd();
        // SAFETY: `fd` was just released from an owned `File` and is closed
        // exactly once here.
        if unsafe { libc::close(fd) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl AsRawFd for FileHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl AsFd for FileHandle {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_open_read_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"abcd").unwrap();

        let handle = FileHandle::open(&path, libc::O_RDONLY).unwrap();
        let mut buf = [0u8; 2];
        let n = handle.read_at(&mut buf, 1).unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf, b"bc");
        assert_eq!(handle.flags(), HandleFlags::default());
        assert_eq!(handle.open_flags(), libc::O_RDONLY);
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = FileHandle::open(&dir.path().join("missing"), libc::O_RDONLY).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }

    #[test]
    fn test_write_only_handle_cannot_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("w.txt");
        fs::write(&path, b"data").unwrap();

        let handle = FileHandle::open(&path, libc::O_WRONLY).unwrap();
        let mut buf = [0u8; 4];
        let err = handle.read_at(&mut buf, 0).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn test_open_flags_pass_through_truncate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.txt");
        fs::write(&path, b"content").unwrap();

        let _handle = FileHandle::open(&path, libc::O_WRONLY | libc::O_TRUNC).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_direct_flag_marks_handle() {
        let flags = HandleFlags::for_open_flags(libc::O_RDWR | libc::O_DIRECT);
        assert!(flags.direct_io);
        assert!(flags.parallel_direct_writes);

        let flags = HandleFlags::for_open_flags(libc::O_RDWR);
        assert!(!flags.direct_io);
        assert!(!flags.parallel_direct_writes);
    }

    #[test]
    fn test_close_reports_success() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.txt");
        fs::write(&path, b"x").unwrap();

        let handle = FileHandle::open(&path, libc::O_RDONLY).unwrap();
        handle.close().unwrap();
    }

    #[test]
    fn test_set_len() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.txt");
        fs::write(&path, b"abcdef").unwrap();

        let handle = FileHandle::open(&path, libc::O_RDWR).unwrap();
        handle.set_len(3).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"abc");
    }
}
