//! Cooldown-gated target resolution with durable snapshot fallback.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use cube_core::{cooldown_elapsed, current_unix_timestamp_ms, write_text_atomic};
use cube_protocol::ServerAddr;

use crate::master_client::MasterListClient;

const DIRECTORY_SNAPSHOT_SCHEMA_VERSION: u32 = 1;
const ADDSERVER_RECORD_PREFIX: &str = "addserver";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DirectorySnapshot {
    schema_version: u32,
    #[serde(default)]
    fetched_unix_ms: u64,
    #[serde(default)]
    servers: Vec<ServerAddr>,
}

/// Resolves the current poll targets, preferring a fresh master-list fetch
/// and degrading to the last known-good snapshot when the master is
/// unreachable or still inside its refresh cooldown.
pub struct DirectoryCache {
    client: MasterListClient,
    snapshot_path: PathBuf,
    refresh_cooldown: Duration,
    servers: Vec<ServerAddr>,
    last_refresh_unix_ms: Option<u64>,
}

impl DirectoryCache {
    /// Seeds the in-memory snapshot from disk when a prior snapshot exists;
    /// the refresh timestamp stays unset so the first call attempts a fetch.
    pub fn new(client: MasterListClient, snapshot_path: PathBuf, refresh_cooldown: Duration) -> Self {
        let servers = match load_snapshot(&snapshot_path) {
            Ok(Some(snapshot)) => snapshot.servers,
            Ok(None) => Vec::new(),
            Err(error) => {
                tracing::warn!(
                    "ignoring unreadable directory snapshot {}: {error:#}",
                    snapshot_path.display()
                );
                Vec::new()
            }
        };
        Self {
            client,
            snapshot_path,
            refresh_cooldown,
            servers,
            last_refresh_unix_ms: None,
        }
    }

    /// Returns the targets to poll this cycle. Never fails: master outages
    /// degrade through memory, then disk, then an empty list.
    pub async fn get_targets(&mut self) -> Vec<ServerAddr> {
        let now = current_unix_timestamp_ms();
        let cooldown_ms = u64::try_from(self.refresh_cooldown.as_millis()).unwrap_or(u64::MAX);
        if !cooldown_elapsed(self.last_refresh_unix_ms, cooldown_ms, now) {
            return self.servers.clone();
        }

        match self.client.fetch_raw_list().await {
            Ok(raw) => {
                let servers = parse_master_list(&raw);
                if let Err(error) = self.persist_snapshot(&servers, now) {
                    tracing::warn!(
                        "failed to persist directory snapshot {}: {error:#}",
                        self.snapshot_path.display()
                    );
                }
                self.servers = servers;
                self.last_refresh_unix_ms = Some(now);
                self.servers.clone()
            }
            Err(error) => {
                tracing::warn!("master list fetch failed, serving cached targets: {error:#}");
                if self.servers.is_empty() {
                    match load_snapshot(&self.snapshot_path) {
                        Ok(Some(snapshot)) => self.servers = snapshot.servers,
                        Ok(None) => {}
                        Err(error) => tracing::warn!(
                            "failed to load directory snapshot {}: {error:#}",
                            self.snapshot_path.display()
                        ),
                    }
                }
                self.servers.clone()
            }
        }
    }

    pub fn last_refresh_unix_ms(&self) -> Option<u64> {
        self.last_refresh_unix_ms
    }

    fn persist_snapshot(&self, servers: &[ServerAddr], fetched_unix_ms: u64) -> Result<()> {
        let snapshot = DirectorySnapshot {
            schema_version: DIRECTORY_SNAPSHOT_SCHEMA_VERSION,
            fetched_unix_ms,
            servers: servers.to_vec(),
        };
        let mut payload =
            serde_json::to_string_pretty(&snapshot).context("failed to serialize snapshot")?;
        payload.push('\n');
        write_text_atomic(&self.snapshot_path, &payload)
    }
}

fn load_snapshot(path: &Path) -> Result<Option<DirectorySnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot file {}", path.display()))?;
    let snapshot = serde_json::from_str::<DirectorySnapshot>(&raw)
        .with_context(|| format!("failed to parse snapshot file {}", path.display()))?;
    Ok(Some(snapshot))
}

/// Parses the newline-delimited master list. Only `addserver` records are of
/// interest; the advertised port is the game port, one below the query port.
/// Malformed lines are skipped individually.
pub fn parse_master_list(raw: &str) -> Vec<ServerAddr> {
    let mut servers = Vec::new();
    for line in raw.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some(ADDSERVER_RECORD_PREFIX) {
            continue;
        }
        let (Some(host), Some(port_token)) = (tokens.next(), tokens.next()) else {
            tracing::debug!("skipping malformed master list line: {line}");
            continue;
        };
        let Some(port) = port_token
            .parse::<u16>()
            .ok()
            .and_then(|port| port.checked_add(1))
        else {
            tracing::debug!("skipping master list line with bad port: {line}");
            continue;
        };
        servers.push(ServerAddr::new(host, port));
    }
    servers
}
