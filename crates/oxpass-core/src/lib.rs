//! Passthrough filesystem adapter.
//!
//! This crate re-executes filesystem requests forwarded by a kernel bridge
//! against an existing host directory tree. It is bridge-agnostic: handlers
//! take a virtual path (and an open [`FileHandle`] where relevant) and return
//! a [`PassResult`], which the bridge turns into its signed status convention
//! via [`BridgeStatus`].
//!
//! # Components
//!
//! - [`attr`] - host metadata to [`Attr`] records
//! - [`handle`] - [`FileHandle`], an owned host descriptor closed on drop
//! - [`dir`] - one-shot directory enumeration into a filler callback
//! - [`ops`] - [`Passthrough`], the operation dispatch table
//! - [`negotiate`] - [`MountCapabilities`] set once at mount time
//! - [`path`] - [`RootMapper`], the virtual-to-host path join
//! - [`oplog`] - the injected diagnostic operation log
//!
//! # Usage
//!
//! ```no_run
//! use oxpass_core::{PassConfig, Passthrough};
//! use std::path::Path;
//!
//! let fs = Passthrough::from_config(&PassConfig::default())?;
//! let attr = fs.getattr(Path::new("/etc/hostname"))?;
//! println!("inode {}", attr.ino);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod attr;
pub mod config;
pub mod dir;
pub mod error;
pub mod handle;
pub mod negotiate;
pub mod oplog;
pub mod ops;
pub mod path;

pub use attr::{Attr, FileKind, Timestamp};
pub use config::{ListingMode, PassConfig};
pub use dir::{DirEntry, FillStatus};
pub use error::{BridgeStatus, PassError, PassResult, ToErrno, io_error_to_errno};
pub use handle::{FileHandle, HandleFlags};
pub use negotiate::MountCapabilities;
pub use oplog::{FileOpLog, MemoryOpLog, NullOpLog, OpEvent, OpLog, OpTarget, TracingOpLog};
pub use ops::{FsStats, Passthrough};
pub use path::RootMapper;
