//! oxpass - Mount a passthrough view of a host directory.
//!
//! Usage: oxpass [--plus] [--root DIR] [--log-file PATH] [-o OPTS] <MOUNTPOINT>
//!
//! `--plus` selects the extended directory listing and may appear anywhere
//! on the command line.

use anyhow::{Context, Result};
use clap::Parser;
use oxpass_core::{ListingMode, PassConfig};
use oxpass_fuse::FuseBackend;
use oxpass_mount::{MountBackend, parse_mount_options, split_listing_flag};
use std::path::PathBuf;
use std::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "oxpass")]
#[command(about = "Mount a passthrough view of a host directory tree")]
#[command(version)]
struct Cli {
    /// Mountpoint for the filesystem
    mountpoint: PathBuf,

    /// Host directory exposed at the mount root
    #[arg(long, default_value = "/")]
    root: PathBuf,

    /// Append one line per operation to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Accepted for compatibility; the mount always stays in the foreground
    #[arg(short, long)]
    foreground: bool,

    /// Accepted for compatibility; requests are served on one session thread
    #[arg(short, long)]
    single_threaded: bool,

    /// Mount options, comma separated (e.g. -o ro,allow_other)
    #[arg(short = 'o', value_name = "OPTS")]
    options: Vec<String>,
}

fn main() -> Result<()> {
    let (listing, args) = split_listing_flag(std::env::args_os());
    let cli = Cli::parse_from(args);

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    run(cli, listing)
}

fn run(cli: Cli, listing: ListingMode) -> Result<()> {
    let backend = FuseBackend::new();
    if let Some(reason) = backend.unavailable_reason() {
        anyhow::bail!("{reason}");
    }

    let mut config = PassConfig::with_root(&cli.root).listing(listing);
    if let Some(path) = &cli.log_file {
        config = config.log_file(path);
    }
    let flags = parse_mount_options(&cli.options);
    tracing::debug!(
        foreground = cli.foreground,
        single_threaded = cli.single_threaded,
        ?flags,
        "Parsed command line"
    );

    let (tx, rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("Failed to set signal handler")?;

    info!(
        root = %cli.root.display(),
        mountpoint = %cli.mountpoint.display(),
        ?listing,
        "Mounting passthrough filesystem (press Ctrl+C to unmount)"
    );

    let handle = backend
        .mount(&config, &cli.mountpoint, &flags)
        .with_context(|| format!("Failed to mount at {}", cli.mountpoint.display()))?;

    info!("Filesystem mounted at {}", cli.mountpoint.display());

    match rx.recv() {
        Ok(()) => info!("Received interrupt signal, unmounting..."),
        Err(_) => warn!("Signal channel closed unexpectedly"),
    }

    handle.unmount().context("Failed to unmount")?;
    info!("Filesystem unmounted");
    Ok(())
}
