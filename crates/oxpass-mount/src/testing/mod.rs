//! Testing utilities for mount integration tests.
//!
//! - **Tree**: [`TempTree`], a temporary host directory seeded with the
//!   reference layout (`a.txt` holding `abcd`, and an empty directory `d`)
//! - **Generators**: file contents and names that exercise edge cases
//! - **Assertions**: content and errno checks with readable failures
//!
//! # Usage
//!
//! ```ignore
//! use oxpass_mount::testing::{TempTree, random_bytes, assert_errno};
//!
//! #[test]
//! fn test_large_read() {
//!     let tree = TempTree::new();
//!     tree.write("big.bin", &random_bytes(1 << 20));
//!     // ... mount tree.path() and read big.bin through the mount ...
//! }
//! ```

pub mod assertions;
pub mod generators;
pub mod tree;

pub use assertions::{assert_bytes_equal, assert_errno, assert_io_ok, errno_name};
pub use generators::{
    BLOCK_SIZE, all_byte_values, deep_path, long_filename, patterned_blocks, random_bytes,
    special_filename, unicode_filename,
};
pub use tree::{REFERENCE_CONTENT, TempTree};
