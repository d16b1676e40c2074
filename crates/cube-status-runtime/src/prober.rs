//! Failure-isolated probing of the cycle's targets.

use std::sync::Arc;

use futures_util::future::join_all;

use cube_protocol::{PlayerStat, QueryError, ServerAddr, ServerStatus, StatusQuery};

/// Successful probe of one target.
#[derive(Debug, Clone)]
pub struct ProbedStatus {
    pub status: ServerStatus,
    pub players: Vec<PlayerStat>,
}

pub type ProbeResult = Result<ProbedStatus, QueryError>;

/// Probes every target independently and concurrently; one unresponsive
/// server cannot block or drop results for the others. The output order
/// matches the input order. Failed probes are retried naturally on the next
/// cycle, never within one.
pub async fn probe_all(
    query: &Arc<dyn StatusQuery>,
    targets: &[ServerAddr],
    include_player_stats: bool,
) -> Vec<(ServerAddr, ProbeResult)> {
    let probes = targets.iter().map(|addr| async move {
        let result = probe_one(query.as_ref(), addr, include_player_stats).await;
        (addr.clone(), result)
    });
    join_all(probes).await
}

async fn probe_one(
    query: &dyn StatusQuery,
    addr: &ServerAddr,
    include_player_stats: bool,
) -> ProbeResult {
    let status = match query.query_status(addr).await {
        Ok(status) => status,
        Err(error) => {
            if error.is_timeout() {
                tracing::warn!("server {addr} did not respond before the probe timeout");
            } else {
                tracing::warn!("probe of {addr} failed: {error}");
            }
            return Err(error);
        }
    };

    let players = if include_player_stats {
        match query.query_player_stats(addr).await {
            Ok(players) => players,
            Err(error) => {
                // Status alone is still reportable; degrade to an empty table.
                tracing::warn!("player stats query for {addr} failed: {error}");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    Ok(ProbedStatus { status, players })
}
