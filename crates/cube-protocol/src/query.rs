//! Query collaborator contract: payload types, error taxonomy, and the
//! [`StatusQuery`] trait the status runtime consumes.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One pollable game-server endpoint. The stored port is the query port; the
/// master list advertises the game port one below it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
}

impl ServerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Port players pass to `/connect`.
    pub fn game_port(&self) -> u16 {
        self.port.saturating_sub(1)
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Live status of one server as returned by the info ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub description: String,
    pub map: String,
    pub mode: i32,
    pub mastermode: i32,
    pub minutes_remaining: i32,
    pub connected_clients: u32,
    pub max_clients: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates the teams a player slot can report.
pub enum Team {
    Cla,
    Rvsf,
    Spect,
}

impl Team {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cla => "CLA",
            Self::Rvsf => "RVSF",
            Self::Spect => "SPECT",
        }
    }

    /// Anything outside the two playing teams reports as spectating.
    pub fn from_wire(value: i32) -> Self {
        match value {
            0 => Self::Cla,
            1 => Self::Rvsf,
            _ => Self::Spect,
        }
    }
}

/// Per-player statistics from the extended query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStat {
    pub name: String,
    pub team: Team,
    pub frags: i32,
    pub deaths: i32,
    pub teamkills: i32,
    pub accuracy: f32,
    pub damage: i32,
    pub flags: i32,
}

#[derive(Debug, Error)]
/// Enumerates probe failure kinds. Timeouts are logged differently from
/// other failures but carry no separate retry policy.
pub enum QueryError {
    #[error("server did not respond before the probe timeout")]
    Timeout,
    #[error("malformed server response: {0}")]
    Protocol(String),
    #[error("query transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

#[async_trait]
/// Trait contract for game-server status queries.
pub trait StatusQuery: Send + Sync {
    async fn query_status(&self, addr: &ServerAddr) -> Result<ServerStatus, QueryError>;

    async fn query_player_stats(&self, addr: &ServerAddr) -> Result<Vec<PlayerStat>, QueryError>;
}
