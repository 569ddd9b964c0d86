//! Framecast CLI: run the render service or render a single job.
//!
//! Usage:
//!   framecast serve [OPTIONS]      Serve the HTTP render API
//!   framecast render <JOB>         Render one job file in-process
//!   framecast check                Check ffmpeg and configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use framecast_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "framecast",
    about = "Turns rendered frames and an audio timeline into published videos",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/framecast/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP render API
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Render one job described by a JSON file
    Render {
        /// Path to the job JSON (same body as POST /video/render_video)
        job: PathBuf,

        /// Skip the pauses between progress updates
        #[arg(long)]
        no_pause: bool,
    },

    /// Check ffmpeg availability and show the effective configuration
    Check,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;
            config.apply_env();
            Ok(config)
        }
        None => Ok(AppConfig::load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    framecast_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            commands::serve::run(config).await
        }
        Commands::Render { job, no_pause } => commands::render::run(config, job, no_pause).await,
        Commands::Check => commands::check::run(&config),
    }
}
