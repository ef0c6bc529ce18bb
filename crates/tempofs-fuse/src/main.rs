//! tempofs - Mount remote HTTP resources as a read-only FUSE filesystem.
//!
//! Usage: tempofs <config.yaml> <mountpoint> [--debug]

// Use mimalloc for reduced allocation latency (enabled by default).
#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;
use tempofs_core::{ResourceConfig, ResourceRegistry};
use tempofs_fuse::{HttpFs, MountConfig, TempoFS, logging};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tempofs")]
#[command(about = "Mount remote HTTP resources as a read-only FUSE filesystem")]
#[command(version)]
struct Cli {
    /// YAML file mapping file names to URLs
    config: PathBuf,

    /// Mountpoint for the filesystem
    mount: PathBuf,

    /// Enable debug logging (including the FUSE session)
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(logging::env_filter(directives.as_deref(), cli.debug))
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    if !cli.mount.is_dir() {
        anyhow::bail!("Mountpoint is not a directory: {}", cli.mount.display());
    }

    let resources = ResourceConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    if resources.is_empty() {
        warn!(config = %cli.config.display(), "Config has no entries, mounting an empty directory");
    }

    let config = MountConfig::default();
    let registry = ResourceRegistry::from_config(&resources, &config.client_options())
        .context("Failed to set up HTTP clients")?;

    info!(
        config = %cli.config.display(),
        mount = %cli.mount.display(),
        resources = registry.len(),
        "Mounting"
    );

    let options = vec![
        fuser::MountOption::FSName(config.fs_name.clone()),
        fuser::MountOption::Subtype("tempofs".to_string()),
        fuser::MountOption::RO,
    ];

    // Woken by Ctrl+C/SIGTERM or by the kernel unmounting us
    let (tx, rx) = mpsc::channel::<()>();

    let fs = TempoFS::new(HttpFs::new(registry), config)
        .context("Failed to initialize filesystem")?
        .notify_on_destroy(tx.clone());

    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("Failed to set signal handler")?;

    info!("Mounting filesystem (press Ctrl+C to unmount)");

    let session = fuser::spawn_mount2(fs, &cli.mount, &options).map_err(|e| {
        error!(error = %e, "Mount failed");
        anyhow::anyhow!("Failed to mount filesystem: {e}")
    })?;

    info!("Filesystem mounted at {}", cli.mount.display());

    match rx.recv() {
        Ok(()) => {
            info!("Shutting down, unmounting...");
        }
        Err(_) => {
            warn!("Signal channel closed unexpectedly");
        }
    }

    drop(session);
    info!("Filesystem unmounted");
    Ok(())
}
