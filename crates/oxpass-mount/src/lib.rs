//! Shared mount-side plumbing for the oxpass passthrough filesystem.
//!
//! [`oxpass_core`] is path-based and keeps no per-mount state. A kernel
//! bridge that speaks in node ids and handle numbers needs a little state of
//! its own, and this crate provides it:
//!
//! - [`HandleTable`] - thread-safe owner of open handles, keyed by the
//!   handle number given to the kernel
//! - [`NodeTable`] - node id to virtual path map keyed by host device and
//!   inode, with lookup counting
//! - [`args`] - command-line helpers (`--plus` extraction, `-o` parsing)
//! - [`MountBackend`] / [`MountHandle`] - the mounting abstraction
//! - [`testing`] - fixtures and generators for integration tests
//!
//! # Example
//!
//! ```
//! use oxpass_mount::{HandleTable, HostKey, NodeTable, ROOT_NODE};
//! use std::path::Path;
//!
//! let handles: HandleTable<String> = HandleTable::new();
//! let fh = handles.insert("open file".to_string());
//! assert_eq!(fh, 1);
//!
//! let nodes = NodeTable::new();
//! let id = nodes.remember(Path::new("/etc"), HostKey::new(2049, 4242));
//! assert_eq!(id, 4242);
//!
//! // Inode 1 on another device never aliases the mount root.
//! let proc = nodes.remember(Path::new("/proc"), HostKey::new(22, 1));
//! assert_ne!(proc, ROOT_NODE);
//! assert_eq!(nodes.path(ROOT_NODE).as_deref(), Some(Path::new("/")));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod args;
mod backend;
mod handle_table;
mod node_table;

pub use args::{MountFlag, parse_mount_options, split_listing_flag};
pub use backend::{MountBackend, MountError, MountHandle, validate_mountpoint, validate_root};
pub use handle_table::HandleTable;
pub use node_table::{FIRST_ALLOCATED_NODE, HostKey, NodeTable, ROOT_NODE};

/// Testing utilities for mount integration tests.
///
/// Provides a temporary host tree fixture, content generators and errno
/// assertions for tests that go through a real mount.
pub mod testing;
