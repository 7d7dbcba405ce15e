//! Adapter configuration.
//!
//! [`PassConfig`] is established once at process start, before the bridge
//! dispatches any request, and is read-only afterwards.

use std::path::PathBuf;

/// Directory listing variant requested at process startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ListingMode {
    /// Plain listing: names and coarse types.
    #[default]
    Plain,
    /// Extended listing: entries are offered with their (partial) attributes
    /// so the bridge can use its readdir-plus protocol.
    Plus,
}

impl ListingMode {
    /// Returns true for the extended listing variant.
    pub fn is_plus(self) -> bool {
        self == ListingMode::Plus
    }
}

/// Configuration for a [`Passthrough`](crate::Passthrough) instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassConfig {
    /// Physical root joined onto every virtual path. `/` is the identity mapping.
    pub root: PathBuf,

    /// Listing variant.
    pub listing: ListingMode,

    /// Where to append the diagnostic operation log.
    ///
    /// `None` routes operation records to `tracing` instead of a file.
    pub log_file: Option<PathBuf>,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            listing: ListingMode::Plain,
            log_file: None,
        }
    }
}

impl PassConfig {
    /// Creates a configuration mapping virtual paths beneath `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Sets the physical root.
    #[must_use]
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Sets the listing variant.
    #[must_use]
    pub fn listing(mut self, listing: ListingMode) -> Self {
        self.listing = listing;
        self
    }

    /// Sets the diagnostic log file.
    #[must_use]
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_identity_plain() {
        let config = PassConfig::default();
        assert_eq!(config.root, PathBuf::from("/"));
        assert_eq!(config.listing, ListingMode::Plain);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PassConfig::with_root("/srv")
            .listing(ListingMode::Plus)
            .log_file("/var/log/oxpass-ops.log");
        assert_eq!(config.root, PathBuf::from("/srv"));
        assert!(config.listing.is_plus());
        assert_eq!(config.log_file, Some(PathBuf::from("/var/log/oxpass-ops.log")));
    }
}
