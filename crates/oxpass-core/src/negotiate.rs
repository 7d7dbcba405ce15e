//! Mount-time capability negotiation.

use crate::config::ListingMode;
use std::time::Duration;

/// Process-wide capabilities fixed once at mount time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountCapabilities {
    /// Report host inode numbers to the kernel.
    pub use_ino: bool,
    /// How long the kernel may cache attributes.
    pub attr_timeout: Duration,
    /// How long the kernel may cache name lookups.
    pub entry_timeout: Duration,
    /// How long the kernel may cache failed lookups.
    pub negative_timeout: Duration,
    /// Allow concurrent direct writes to one file.
    pub parallel_direct_writes: bool,
    /// Use the extended (readdir-plus) listing protocol.
    pub readdir_plus: bool,
}

impl Default for MountCapabilities {
    /// The bridge's defaults before negotiation (libfuse: 1s attribute and
    /// entry caching, no negative caching).
    fn default() -> Self {
        Self {
            use_ino: false,
            attr_timeout: Duration::from_secs(1),
            entry_timeout: Duration::from_secs(1),
            negative_timeout: Duration::ZERO,
            parallel_direct_writes: false,
            readdir_plus: false,
        }
    }
}

impl MountCapabilities {
    /// Applies the adapter's capabilities.
    ///
    /// Every kernel cache is disabled so each request reaches the host
    /// filesystem; inode numbers are propagated and overlapping direct writes
    /// allowed.
    pub fn negotiate(&mut self, listing: ListingMode) {
        self.use_ino = true;
        self.attr_timeout = Duration::ZERO;
        self.entry_timeout = Duration::ZERO;
        self.negative_timeout = Duration::ZERO;
        self.parallel_direct_writes = true;
        self.readdir_plus = listing.is_plus();
    }

    /// Returns freshly negotiated capabilities.
    pub fn negotiated(listing: ListingMode) -> Self {
        let mut caps = Self::default();
        caps.negotiate(listing);
        caps
    }
}
