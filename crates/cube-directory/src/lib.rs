//! Master-server directory access for cubewatch.
//!
//! Resolves the current set of poll targets from the remote master list,
//! with a refresh cooldown, atomic on-disk snapshot persistence, and a
//! fresh -> memory -> disk -> empty fallback chain so directory outages
//! never surface to the poll loop.

pub mod directory_cache;
pub mod master_client;

pub use directory_cache::{parse_master_list, DirectoryCache};
pub use master_client::MasterListClient;
