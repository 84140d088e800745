pub mod config;

use clap::{Parser, Subcommand};

/// cookline — a per-session recipe execution engine.
#[derive(Debug, Parser)]
#[command(name = "cookline", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
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

// ── Config loading helper ─────────────────────────────────────────────

/// Loads the configuration from the path named by `COOKLINE_CONFIG` (or
/// `config.toml` by default). Shared by `serve` and the `config`
/// subcommands so the logic lives in one place.
pub fn load_config() -> anyhow::Result<(cl_domain::config::Config, String)> {
    let config_path = std::env::var("COOKLINE_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        cl_domain::config::Config::from_file(std::path::Path::new(&config_path))
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?
    } else {
        cl_domain::config::Config::default()
    };

    Ok((config, config_path))
}
