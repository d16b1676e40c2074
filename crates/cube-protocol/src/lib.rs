//! Game-server query collaborator for cubewatch.
//!
//! Speaks the cube-engine info protocol over UDP and exposes the
//! [`StatusQuery`] seam the status runtime polls through.

pub mod query;
pub mod udp;
mod wire;

pub use query::{PlayerStat, QueryError, ServerAddr, ServerStatus, StatusQuery, Team};
pub use udp::UdpStatusQuery;
