//! Command-line interface for the `maestro` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use maestro_domain::config::Config;
use maestro_domain::error::Result;

#[derive(Debug, Parser)]
#[command(name = "maestro", about = "Agentic chat orchestrator")]
pub struct Cli {
    /// Path to the config file (default: maestro.toml, or $MAESTRO_CONFIG).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway (default when no subcommand is given).
    Serve,
    /// Configuration helpers.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the version.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Validate the config file and report issues.
    Validate,
    /// Print the effective configuration as TOML.
    Show,
}

/// Resolve the config path (flag > env > default) and load it.
pub fn load_config(cli: &Cli) -> Result<(Config, PathBuf)> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var("MAESTRO_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("maestro.toml"));
    let config = Config::load(&path)?;
    Ok((config, path))
}

/// Print every validation issue; returns false when any is an error.
pub fn validate(config: &Config, path: &std::path::Path) -> bool {
    use maestro_domain::config::ConfigSeverity;

    let issues = config.validate();
    if issues.is_empty() {
        println!("{}: OK", path.display());
        return true;
    }
    for issue in &issues {
        println!("{issue}");
    }
    !issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error)
}

pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("failed to render config: {e}"),
    }
}
