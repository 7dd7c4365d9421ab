//! dynacmd-worker: hosts the command loader for one or more tenants.
//!
//! Loads every tenant's commands at startup, then rescans the command
//! directory on an interval (and, with `--watch`, whenever a command file
//! changes), logging each change batch a server would apply.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use dynacmd_core::config::{load_dotenv, Config};
use dynacmd_loader::scheduler::watch_command_dir;
use dynacmd_loader::{
    ChangeEvent, CommandLoader, ReloadScheduler, SchedulerConfig, SourceCommand, SourceCompiler,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Command hot-reload worker.
#[derive(Parser, Debug)]
#[command(name = "dynacmd-worker", version, about)]
struct Cli {
    /// Tenant to load commands for (repeat or comma-separate for several).
    #[arg(long = "tenant", env = "DYNACMD_TENANTS", value_delimiter = ',', required = true)]
    tenants: Vec<String>,

    /// Base directory holding the `Command` directory (overrides BASE_DIR).
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Seconds between rescans (overrides RESCAN_INTERVAL_SECS).
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Also rescan shortly after command files change on disk.
    #[arg(long)]
    watch: bool,

    /// Load, run a single rescan, print its report as JSON and exit.
    #[arg(long)]
    once: bool,
}

/// Update sink that logs what a server would apply.
fn log_sink(
    tenant: String,
) -> impl Fn(Vec<ChangeEvent<SourceCommand>>) + Send + Sync + 'static {
    move |batch: Vec<ChangeEvent<SourceCommand>>| {
        for event in &batch {
            info!(
                tenant = %tenant,
                action = %event.action,
                command = %event.payload.name,
                "command update"
            );
        }
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.base_dir {
        config.base_dir = dir;
    }
    if let Some(secs) = cli.interval_secs {
        config.rescan_interval = Duration::from_secs(secs);
    }
    config.validate()?;
    config.log_summary();

    let loader = CommandLoader::from_config(&config, SourceCompiler);
    for tenant in &cli.tenants {
        let count = loader
            .register(
                tenant,
                |cmd| {
                    info!(tenant = %tenant, command = %cmd.name, "command registered");
                    true
                },
                log_sink(tenant.clone()),
            )
            .with_context(|| format!("failed to load commands for tenant '{}'", tenant))?;
        info!(tenant = %tenant, commands = count, "tenant ready");
    }

    if cli.once {
        let report = loader.run_cycle()?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let scheduler =
        ReloadScheduler::start(loader.clone(), SchedulerConfig::from_config(&config))?;

    let _watcher = if cli.watch {
        let extensions = loader.extensions().clone();
        match watch_command_dir(loader.command_dir(), extensions, scheduler.handle()) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!(
                    error = %e,
                    "could not watch command directory, relying on the rescan interval"
                );
                None
            }
        }
    } else {
        None
    };

    info!("dynacmd-worker running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("dynacmd-worker shutting down");
    tokio::task::spawn_blocking(move || scheduler.shutdown()).await?;
    info!("dynacmd-worker exited cleanly");
    Ok(())
}
