//! Command-line plumbing shared by `validate-ids` and `get-coords`

use anyhow::{Context, Result};
use cgtools_common::config::{load_config_or_default, CliOverrides, Settings};
use cgtools_common::{ids, InputId};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// Arguments common to both tools
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Input file with IDs, one per line (`old → new` lines use the new ID)
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Output file (default derived from the input file name)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Datastack name
    #[arg(short, long)]
    pub datastack: Option<String>,

    /// Parallel workers for per-ID lookups
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// TOML config file (default: ~/.config/cgtools/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Global CAVE server URL
    #[arg(long, value_name = "URL")]
    pub server: Option<String>,

    /// Per-lookup deadline in seconds (0 disables)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Client-side request rate limit (0 disables)
    #[arg(long, value_name = "N")]
    pub max_rps: Option<u32>,
}

impl CommonArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            global_server: self.server.clone(),
            datastack: self.datastack.clone(),
            workers: self.workers,
            task_timeout_secs: self.timeout,
            max_requests_per_second: self.max_rps,
        }
    }
}

/// Install the fmt subscriber; `RUST_LOG` overrides the configured level
pub fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

/// Load config, start logging, and resolve run settings
pub fn start(tool: &str, args: &CommonArgs) -> Result<Settings> {
    let toml_config =
        load_config_or_default(args.config.as_deref()).context("Failed to load config")?;

    init_tracing(&toml_config.logging.level);
    info!(
        "Starting {} v{} [{}] built {} ({})",
        tool,
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let settings =
        Settings::resolve(&args.overrides(), &toml_config).context("Invalid settings")?;
    info!(
        datastack = %settings.datastack,
        server = %settings.global_server,
        workers = settings.workers,
        timeout = ?settings.task_timeout,
        max_rps = ?settings.max_requests_per_second,
        "Resolved settings"
    );
    Ok(settings)
}

/// Read and parse the input ID file
pub fn read_ids(args: &CommonArgs) -> Result<Vec<InputId>> {
    info!("Reading IDs...");
    let ids = ids::read_id_file(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    info!("Found {} IDs", ids.len());
    Ok(ids)
}
