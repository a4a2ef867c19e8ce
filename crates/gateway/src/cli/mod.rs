pub mod config;
pub mod doctor;

use clap::{Parser, Subcommand};

/// SARK — a security-aware gateway sitting in front of MCP/HTTP/gRPC/database
/// tool servers.
#[derive(Debug, Parser)]
#[command(name = "sarkd", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
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

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `SARK_CONFIG` (or
/// `sark.toml` by default). Returns the parsed [`GatewayConfig`] and the
/// path that was used.
///
/// Shared by `serve`, `doctor`, and `config` subcommands so the logic
/// lives in one place.
pub fn load_config() -> anyhow::Result<(crate::config::GatewayConfig, String)> {
    let config_path = std::env::var("SARK_CONFIG").unwrap_or_else(|_| "sark.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path).map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        crate::config::GatewayConfig::default()
    };

    Ok((config, config_path))
}
