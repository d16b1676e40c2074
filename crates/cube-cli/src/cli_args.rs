use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, ValueEnum};

fn parse_positive_u64(value: &str) -> std::result::Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_usize(value: &str) -> std::result::Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliPollMode {
    /// Aggregate every populated server from the master directory into one
    /// message.
    Master,
    /// Report one fixed server, including player statistics.
    Server,
}

#[derive(Debug, Parser)]
#[command(
    name = "cubewatch",
    about = "Keeps one Discord message per channel in step with live AssaultCube server status",
    version
)]
pub struct CliArgs {
    #[arg(long, env = "CUBEWATCH_DISCORD_TOKEN", hide_env_values = true)]
    pub discord_token: String,

    #[arg(long, env = "CUBEWATCH_CHANNEL_ID")]
    pub channel_id: String,

    #[arg(long, value_enum, default_value = "master", env = "CUBEWATCH_MODE")]
    pub mode: CliPollMode,

    #[arg(long, default_value = "http://ms.cubers.net", env = "CUBEWATCH_MASTER_URL")]
    pub master_url: String,

    /// Fixed server host (server mode only).
    #[arg(long, env = "CUBEWATCH_SERVER_HOST")]
    pub server_host: Option<String>,

    /// Fixed server query port (server mode only).
    #[arg(long, env = "CUBEWATCH_SERVER_PORT")]
    pub server_port: Option<u16>,

    #[arg(
        long,
        default_value_t = 60,
        value_parser = parse_positive_u64,
        env = "CUBEWATCH_POLL_INTERVAL_SECONDS"
    )]
    pub poll_interval_seconds: u64,

    #[arg(
        long,
        default_value_t = 12,
        value_parser = parse_positive_u64,
        env = "CUBEWATCH_MASTER_REFRESH_COOLDOWN_HOURS"
    )]
    pub master_refresh_cooldown_hours: u64,

    /// Directory holding the cached master-list snapshot.
    #[arg(long, default_value = ".cubewatch", env = "CUBEWATCH_STATE_DIR")]
    pub state_dir: PathBuf,

    #[arg(long, default_value_t = 5_000, value_parser = parse_positive_u64)]
    pub request_timeout_ms: u64,

    #[arg(long, default_value_t = 2_000, value_parser = parse_positive_u64)]
    pub probe_timeout_ms: u64,

    #[arg(long, default_value_t = 3, value_parser = parse_positive_usize)]
    pub retry_max_attempts: usize,

    #[arg(long, default_value_t = 250, value_parser = parse_positive_u64)]
    pub retry_base_delay_ms: u64,

    /// Run exactly one cycle and exit.
    #[arg(long, action = ArgAction::SetTrue)]
    pub poll_once: bool,

    #[arg(
        long,
        default_value = "https://discord.com/api/v10",
        env = "CUBEWATCH_DISCORD_API_BASE"
    )]
    pub discord_api_base: String,
}

impl CliArgs {
    /// Server mode needs a fixed endpoint; master mode ignores one.
    pub fn fixed_server(&self) -> Result<Option<(String, u16)>> {
        match self.mode {
            CliPollMode::Master => Ok(None),
            CliPollMode::Server => match (self.server_host.clone(), self.server_port) {
                (Some(host), Some(port)) if !host.trim().is_empty() => {
                    Ok(Some((host.trim().to_string(), port)))
                }
                _ => bail!("server mode requires --server-host and --server-port"),
            },
        }
    }
}
