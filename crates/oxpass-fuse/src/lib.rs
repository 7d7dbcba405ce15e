//! FUSE passthrough filesystem.
//!
//! Mounts a view of an existing host directory tree through the kernel FUSE
//! bridge. Requests are re-executed against the host by
//! [`oxpass_core::Passthrough`]; this crate supplies the inode-based
//! protocol glue (node and handle tables, reply encoding) and the mount
//! lifecycle.
//!
//! # Features
//!
//! - Read-mostly operation set: lookup, getattr, open, read, size-only
//!   setattr, readdir and readdirplus, access, statfs
//! - Host inode numbers reported to the kernel unchanged
//! - No kernel caching of attributes or names
//!
//! # Usage
//!
//! ```ignore
//! use oxpass_core::PassConfig;
//! use oxpass_fuse::FuseBackend;
//! use oxpass_mount::MountBackend;
//!
//! let config = PassConfig::with_root("/srv/data");
//! let handle = FuseBackend::new().mount(&config, Path::new("/mnt/pass"), &[])?;
//! // ...
//! handle.unmount()?;
//! ```

pub mod attr;
pub mod backend;
pub mod filesystem;

pub use backend::{FuseBackend, FuseMountHandle, SUBTYPE, mount_options};
pub use filesystem::{FOPEN_PARALLEL_DIRECT_WRITES, PassthroughFS};
