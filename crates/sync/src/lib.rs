//! Block-chain synchronization engine for the Meridian node.
//!
//! Keeps the local chain in lockstep with the network by exchanging typed,
//! flag-tagged bundles over a gossip/streaming transport, tracking every
//! peer's identity and liveness, and orchestrating bounded block-download
//! sessions against suitable peers.
//!
//! # Important notes
//!
//! 1. The sync module pulls instead of pushing: the network does not update
//!    a node; a node updates itself.
//!
//! 2. The synchronizer holds no locks, to prevent deadlocks with its
//!    collaborators. All submodules (peer set, cache, session table) and all
//!    collaborators (state, consensus) must be thread-safe.

pub mod cache;
pub mod config;
pub mod error;
pub mod firewall;
pub mod peerset;
pub mod synchronizer;
pub mod traits;

mod handlers;

pub use cache::Cache;
pub use config::{FirewallConfig, SyncConfig};
pub use error::SyncError;
pub use firewall::Firewall;
pub use peerset::{NetworkInfo, Peer, PeerSet, PeerStatus, Session};
pub use synchronizer::{SyncCore, Synchronizer};
pub use traits::{CommittedBlock, Consensus, StateFacade};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

/// The agent string advertised in the hello handshake.
pub fn agent() -> String {
    format!("meridian/{}", env!("CARGO_PKG_VERSION"))
}
