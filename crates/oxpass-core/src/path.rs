//! Virtual-to-host path mapping.
//!
//! Every host call goes through [`RootMapper::to_host`], which joins a
//! configurable physical root onto the virtual path presented by the bridge.
//! The virtual path loses its leading `/` and is otherwise used verbatim:
//! no normalization, no `..` resolution, no sandboxing. With the default
//! root of `/` the mapping is the identity.

use std::path::{Path, PathBuf};

/// Joins a physical root onto virtual paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootMapper {
    root: PathBuf,
}

impl Default for RootMapper {
    fn default() -> Self {
        Self::identity()
    }
}

impl RootMapper {
    /// Identity mapping: the virtual path is the host path.
    pub fn identity() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }

    /// Maps virtual paths beneath `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the physical root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if virtual paths are used unchanged.
    pub fn is_identity(&self) -> bool {
        self.root == Path::new("/")
    }

    /// Returns the host path for a virtual path.
    pub fn to_host(&self, virtual_path: &Path) -> PathBuf {
        let relative = virtual_path.strip_prefix("/").unwrap_or(virtual_path);
        if relative.as_os_str().is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }
}
