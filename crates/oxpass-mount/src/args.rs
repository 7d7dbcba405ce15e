//! Command-line helpers.
//!
//! The process entry takes one adapter flag, `--plus`, which is removed from
//! the argument list before anything else sees it. Everything left over is
//! bridge arguments. `-o` mount options arrive as comma-separated strings and
//! are decoded into [`MountFlag`]s here so the bridge crate only has to map
//! them onto its own option type.

use oxpass_core::ListingMode;
use std::ffi::OsString;

/// The adapter flag selecting the extended listing variant.
pub const PLUS_FLAG: &str = "--plus";

/// Removes every `--plus` from `args`.
///
/// Returns the listing mode and the remaining arguments in their original
/// order. The first element (the program name) is never treated as a flag.
pub fn split_listing_flag<I>(args: I) -> (ListingMode, Vec<OsString>)
where
    I: IntoIterator<Item = OsString>,
{
    let mut listing = ListingMode::Plain;
    let mut rest = Vec::new();
    let mut args = args.into_iter();

    if let Some(program) = args.next() {
        rest.push(program);
    }
    for arg in args {
        if arg == PLUS_FLAG {
            listing = ListingMode::Plus;
        } else {
            rest.push(arg);
        }
    }
    (listing, rest)
}

/// One decoded `-o` mount option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountFlag {
    /// `ro`
    ReadOnly,
    /// `rw`
    ReadWrite,
    /// `allow_other`
    AllowOther,
    /// `allow_root`
    AllowRoot,
    /// `auto_unmount`
    AutoUnmount,
    /// `default_permissions`
    DefaultPermissions,
    /// `fsname=NAME`
    FsName(String),
    /// `subtype=TYPE`
    Subtype(String),
    /// Anything else, passed through verbatim.
    Custom(String),
}

impl MountFlag {
    /// Decodes a single option.
    pub fn parse(option: &str) -> Self {
        match option {
            "ro" => MountFlag::ReadOnly,
            "rw" => MountFlag::ReadWrite,
            "allow_other" => MountFlag::AllowOther,
            "allow_root" => MountFlag::AllowRoot,
            "auto_unmount" => MountFlag::AutoUnmount,
            "default_permissions" => MountFlag::DefaultPermissions,
            _ => {
                if let Some(name) = option.strip_prefix("fsname=") {
                    MountFlag::FsName(name.to_string())
                } else if let Some(kind) = option.strip_prefix("subtype=") {
                    MountFlag::Subtype(kind.to_string())
                } else {
                    MountFlag::Custom(option.to_string())
                }
            }
        }
    }
}

/// Decodes every `-o` value, splitting on commas and skipping empty items.
pub fn parse_mount_options<S: AsRef<str>>(values: &[S]) -> Vec<MountFlag> {
    values
        .iter()
        .flat_map(|value| value.as_ref().split(','))
        .map(str::trim)
        .filter(|option| !option.is_empty())
        .map(MountFlag::parse)
        .collect()
}
