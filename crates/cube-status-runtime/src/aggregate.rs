//! Reduces per-target probe results to the cycle's reportable entries.

use cube_protocol::{PlayerStat, ServerAddr, ServerStatus};

use crate::prober::ProbeResult;

/// One target's status data selected for this cycle's published content.
#[derive(Debug, Clone)]
pub struct ReportableEntry {
    pub addr: ServerAddr,
    pub status: ServerStatus,
    pub players: Vec<PlayerStat>,
}

/// Directory mode: only servers with at least one connected player earn a
/// slot in the aggregate message. Probe order is preserved.
pub fn aggregate_directory(results: Vec<(ServerAddr, ProbeResult)>) -> Vec<ReportableEntry> {
    results
        .into_iter()
        .filter_map(|(addr, result)| match result {
            Ok(probed) if probed.status.connected_clients > 0 => Some(ReportableEntry {
                addr,
                status: probed.status,
                players: probed.players,
            }),
            _ => None,
        })
        .collect()
}

/// Single-server mode: an idle known server is still worth reporting, so no
/// player-count filter applies. Only unreachable servers drop out.
pub fn aggregate_single(results: Vec<(ServerAddr, ProbeResult)>) -> Vec<ReportableEntry> {
    results
        .into_iter()
        .filter_map(|(addr, result)| match result {
            Ok(probed) => Some(ReportableEntry {
                addr,
                status: probed.status,
                players: probed.players,
            }),
            Err(_) => None,
        })
        .collect()
}
