//! cubewatch entry point: argument parsing, collaborator construction, and
//! runtime launch.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cube_directory::{DirectoryCache, MasterListClient};
use cube_discord::DiscordApiClient;
use cube_protocol::{ServerAddr, UdpStatusQuery};
use cube_status_runtime::{run_status_runtime, PollSource, StatusRuntimeConfig};

mod cli_args;

use cli_args::CliArgs;

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    let messenger = Arc::new(DiscordApiClient::new(
        args.discord_api_base.clone(),
        args.discord_token.clone(),
        args.request_timeout_ms,
        args.retry_max_attempts,
        args.retry_base_delay_ms,
    )?);
    let query = Arc::new(UdpStatusQuery::new(Duration::from_millis(
        args.probe_timeout_ms,
    )));

    let source = match args.fixed_server()? {
        Some((host, port)) => PollSource::Fixed {
            addr: ServerAddr::new(host, port),
        },
        None => {
            let client = MasterListClient::new(
                args.master_url.clone(),
                args.request_timeout_ms,
                args.retry_max_attempts,
                args.retry_base_delay_ms,
            )?;
            let directory = DirectoryCache::new(
                client,
                args.state_dir.join("master-server-list.json"),
                Duration::from_secs(args.master_refresh_cooldown_hours * 3_600),
            );
            PollSource::Master { directory }
        }
    };

    run_status_runtime(StatusRuntimeConfig {
        messenger,
        query,
        channel_id: args.channel_id,
        source,
        poll_interval: Duration::from_secs(args.poll_interval_seconds),
        poll_once: args.poll_once,
    })
    .await
}
