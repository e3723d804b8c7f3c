//! CLI surface (§1a, §9 Open Question 1 — config precedence): `serve` is the
//! default with no subcommand, `doctor`/`config` mirror the teacher's shape
//! one-for-one since both operate on the same `Config` this crate already has.

pub mod config;
pub mod doctor;

use clap::{Parser, Subcommand};

/// agentd — an orchestration gateway.
#[derive(Debug, Parser)]
#[command(name = "agentd", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gRPC gateway (default when no subcommand is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Load the configuration from the path named by `AGENTD_CONFIG` (or
/// `config.toml` by default). Shared by `serve`, `doctor`, and `config` so
/// the resolution logic lives in one place.
pub fn load_config() -> anyhow::Result<(agentd_domain::config::Config, String)> {
    let config_path = std::env::var("AGENTD_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        agentd_domain::config::Config::load(std::path::Path::new(&config_path))
            .map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?
    } else {
        agentd_domain::config::Config::default()
    };

    Ok((config, config_path))
}
