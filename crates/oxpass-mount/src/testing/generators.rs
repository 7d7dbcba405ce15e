//! Test data generators.
//!
//! Sizes are expressed relative to [`BLOCK_SIZE`] so reads can be made to
//! straddle page and block boundaries.

use rand::Rng;

/// Typical host block and page size.
pub const BLOCK_SIZE: usize = 4096;

/// Generate random bytes of specified size.
pub fn random_bytes(size: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    (0..size).map(|_| rng.random()).collect()
}

/// Generate content containing all 256 possible byte values.
pub fn all_byte_values() -> Vec<u8> {
    (0u8..=255).collect()
}

/// Generate `blocks` blocks, each filled with its own index.
///
/// A read at the wrong offset shows up as the wrong fill byte.
pub fn patterned_blocks(blocks: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(blocks * BLOCK_SIZE);
    for block in 0..blocks {
        #[allow(clippy::cast_possible_truncation)]
        let fill = (block % 256) as u8;
        data.extend(std::iter::repeat_n(fill, BLOCK_SIZE));
    }
    data
}

/// Generate a filename with Unicode characters.
pub fn unicode_filename() -> String {
    "\u{6587}\u{4ef6}-\u{3b1}\u{3b2}\u{3b3}-emoji\u{1f389}.txt".to_string()
}

/// Generate a filename with spaces, symbols and punctuation.
pub fn special_filename() -> String {
    "file with spaces & (special) chars!.txt".to_string()
}

/// Generate a filename at the common 255-byte limit.
pub fn long_filename() -> String {
    format!("{}.txt", "a".repeat(251))
}

/// Generate a nested relative path, e.g. `dir0/dir1/dir2`.
pub fn deep_path(depth: usize) -> String {
    (0..depth)
        .map(|i| format!("dir{i}"))
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes_length() {
        assert_eq!(random_bytes(0).len(), 0);
        assert_eq!(random_bytes(BLOCK_SIZE + 1).len(), BLOCK_SIZE + 1);
    }

    #[test]
    fn test_patterned_blocks() {
        let data = patterned_blocks(3);
        assert_eq!(data.len(), 3 * BLOCK_SIZE);
        assert_eq!(data[0], 0);
        assert_eq!(data[BLOCK_SIZE], 1);
        assert_eq!(data[3 * BLOCK_SIZE - 1], 2);
    }

    #[test]
    fn test_names() {
        assert_eq!(long_filename().len(), 255);
        assert_eq!(deep_path(0), "");
        assert_eq!(deep_path(3), "dir0/dir1/dir2");
        assert_eq!(all_byte_values().len(), 256);
    }
}
