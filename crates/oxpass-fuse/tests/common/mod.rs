//! Common test infrastructure for FUSE integration tests.
//!
//! Provides the `TestMount` harness for testing the passthrough filesystem
//! through actual kernel mounts.

pub mod harness;

pub use harness::TestMount;

pub use oxpass_mount::testing::{
    BLOCK_SIZE, REFERENCE_CONTENT, TempTree, all_byte_values, assert_bytes_equal, assert_errno,
    assert_io_ok, deep_path, long_filename, patterned_blocks, random_bytes, special_filename,
    unicode_filename,
};

// Macros (skip_if_no_fuse!, require_mount!) are #[macro_export] so they're
// available at the crate root.
