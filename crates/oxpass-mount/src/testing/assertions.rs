//! Assertions with readable failure messages.

use std::fmt::Debug;
use std::io;

/// Assert that two byte slices are equal.
///
/// On failure, reports sizes and the first differing position instead of
/// dumping both buffers.
pub fn assert_bytes_equal(actual: &[u8], expected: &[u8], context: &str) {
    assert!(
        actual.len() == expected.len(),
        "{context}: size mismatch - expected {} bytes, got {} bytes",
        expected.len(),
        actual.len()
    );

    if let Some(i) = actual.iter().zip(expected).position(|(a, e)| a != e) {
        panic!(
            "{context}: content mismatch at byte {i} - expected 0x{:02x}, got 0x{:02x}",
            expected[i], actual[i]
        );
    }
}

/// Assert that an I/O result failed with `expected_errno`.
pub fn assert_errno<T: Debug>(result: io::Result<T>, expected_errno: i32, context: &str) {
    match result {
        Ok(value) => {
            panic!("{context}: expected errno {expected_errno} but got success with {value:?}");
        }
        Err(err) => {
            let actual = err.raw_os_error().unwrap_or(0);
            assert!(
                actual == expected_errno,
                "{context}: expected errno {expected_errno} ({}), got errno {actual} ({})",
                errno_name(expected_errno),
                errno_name(actual)
            );
        }
    }
}

/// Assert that an I/O result is Ok and return its value.
pub fn assert_io_ok<T>(result: io::Result<T>, context: &str) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            let errno = err.raw_os_error().unwrap_or(0);
            panic!(
                "{context}: expected success but got error: {err} (errno {errno} = {})",
                errno_name(errno)
            );
        }
    }
}

/// Symbolic name for common errno values.
pub fn errno_name(errno: i32) -> &'static str {
    match errno {
        libc::ENOENT => "ENOENT",
        libc::ENOTDIR => "ENOTDIR",
        libc::EISDIR => "EISDIR",
        libc::EACCES => "EACCES",
        libc::EPERM => "EPERM",
        libc::EINVAL => "EINVAL",
        libc::EIO => "EIO",
        libc::EBADF => "EBADF",
        libc::ENOSYS => "ENOSYS",
        libc::EFBIG => "EFBIG",
        libc::EROFS => "EROFS",
        libc::ENAMETOOLONG => "ENAMETOOLONG",
        _ => "UNKNOWN",
    }
}
