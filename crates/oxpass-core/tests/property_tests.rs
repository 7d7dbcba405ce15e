//! Property-based tests for read ranges and truncation.
//!
//! Generated contents and offsets are checked against a reference `Vec<u8>`.

mod common;

use common::Fixture;
use proptest::prelude::*;
use std::fs;
use std::path::Path;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A read returns exactly `min(size, len - offset)` bytes, equal to the
    /// host content at that range, and zero bytes at or past the end.
    #[test]
    fn read_returns_host_range(
        content in prop::collection::vec(any::<u8>(), 0..4096),
        offset in 0u64..5000,
        size in 0usize..2048,
        use_handle in any::<bool>(),
    ) {
        let fx = Fixture::new();
        fx.write("/p.bin", &content);
        let path = Path::new("/p.bin");

        let fh = if use_handle {
            Some(fx.fs.open(path, libc::O_RDONLY).unwrap())
        } else {
            None
        };
        let got = fx.fs.read_vec(path, fh.as_ref(), size, offset).unwrap();

        let start = usize::try_from(offset).unwrap().min(content.len());
        let end = (start + size).min(content.len());
        prop_assert_eq!(got.as_slice(), &content[start..end]);
    }

    /// After truncating to `len`, the host file is the old prefix (zero
    /// padded when growing) and a second truncate changes nothing.
    #[test]
    fn truncate_matches_reference(
        content in prop::collection::vec(any::<u8>(), 0..2048),
        len in 0u64..4096,
        use_handle in any::<bool>(),
    ) {
        let fx = Fixture::new();
        fx.write("/t.bin", &content);
        let path = Path::new("/t.bin");

        let fh = if use_handle {
            Some(fx.fs.open(path, libc::O_RDWR).unwrap())
        } else {
            None
        };
        fx.fs.truncate(path, fh.as_ref(), len).unwrap();

        let mut reference = content;
        reference.resize(usize::try_from(len).unwrap(), 0);
        prop_assert_eq!(fs::read(fx.host("/t.bin")).unwrap(), reference.clone());
        prop_assert_eq!(fx.fs.getattr(path).unwrap().size, len);

        fx.fs.truncate(path, fh.as_ref(), len).unwrap();
        prop_assert_eq!(fs::read(fx.host("/t.bin")).unwrap(), reference);
    }
}
