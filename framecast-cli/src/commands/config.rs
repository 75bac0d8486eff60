use std::fmt::Write as _;

use crate::config::{ConfigLoader, ENV_VARS, FramecastConfig};
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (merged) and the server settings it yields
    Show,
    /// Show configuration file paths
    Path,
    /// Show the environment overrides currently set
    Env,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(),
        ConfigCommands::Path => show_paths(),
        ConfigCommands::Env => show_env(),
    }
}

fn show_config() -> Result<()> {
    let config = ConfigLoader::load()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{}", toml_str);
    print!("{}", effective_settings(&config)?);
    Ok(())
}

/// What `framecast serve` would run with, as TOML comments
///
/// Fails the same way `serve` does when a value cannot be used.
fn effective_settings(config: &FramecastConfig) -> Result<String> {
    let server = config.to_server_config()?;

    let sessions = match server.max_queue_size {
        0 => "unlimited".to_string(),
        limit => limit.to_string(),
    };
    let idle = if server.timeout.is_zero() {
        "disabled".to_string()
    } else {
        format!("{:?}", server.timeout)
    };

    let mut out = String::from("# Effective server settings\n");
    writeln!(out, "# listen:   {}", server.addr())?;
    writeln!(out, "# sessions: {}", sessions)?;
    writeln!(out, "# idle:     {}", idle)?;
    writeln!(out, "# cadence:  {:?}", server.transfer.cadence)?;
    writeln!(out, "# kernel:   {}", server.kernel)?;
    Ok(out)
}

fn show_paths() -> Result<()> {
    println!("User config:    {:?}", ConfigLoader::user_config_path());
    println!("Project config: {:?}", ConfigLoader::project_config_path());
    Ok(())
}

fn show_env() -> Result<()> {
    print!("{}", env_report(|key| std::env::var(key).ok()));
    Ok(())
}

fn env_report(lookup: impl Fn(&str) -> Option<String>) -> String {
    ENV_VARS
        .iter()
        .map(|key| match lookup(key).filter(|value| !value.trim().is_empty()) {
            Some(value) => format!("{:<16}{}\n", key, value),
            None => format!("{:<16}(unset)\n", key),
        })
        .collect()
}
