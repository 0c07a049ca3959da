use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Pathway AI model router
#[derive(Debug, Parser)]
#[command(name = "pathway", about = "Health-aware AI model routing with circuit breakers and fallback")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "pathway.toml", env = "PATHWAY_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "PATHWAY_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Log filter directive, overriding `telemetry.log_filter`
    #[arg(long, env = "PATHWAY_LOG")]
    pub log_filter: Option<String>,
}
