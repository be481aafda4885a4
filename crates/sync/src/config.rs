//! Synchronizer configuration.

use crate::error::SyncError;
use std::time::Duration;

/// Configuration for the synchronizer.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Display name sent in the hello handshake.
    pub moniker: String,

    /// How long a block-download session may stay quiet before it is swept.
    pub session_timeout: Duration,

    /// Whether this node keeps full history and advertises the network
    /// service.
    pub node_network: bool,

    /// Maximum blocks served in a single `BlocksResponse`.
    pub block_per_message: u32,

    /// Entries retained in the block/certificate cache.
    pub cache_size: usize,

    /// Blocks requested per download session, and the catch-up distance
    /// beyond which only network-service peers are asked.
    pub latest_block_interval: u32,

    /// Firewall policy.
    pub firewall: FirewallConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            moniker: String::new(),
            session_timeout: Duration::from_secs(10),
            node_network: true,
            block_per_message: 60,
            cache_size: 500_000,
            latest_block_interval: 720,
            firewall: FirewallConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Validate the configuration. Construction-time failures are the only
    /// fatal errors in this subsystem.
    pub fn basic_check(&self) -> Result<(), SyncError> {
        if self.cache_size == 0 {
            return Err(SyncError::Config("cache size cannot be zero".into()));
        }
        if self.block_per_message == 0 {
            return Err(SyncError::Config("block per message cannot be zero".into()));
        }
        if self.latest_block_interval == 0 {
            return Err(SyncError::Config(
                "latest block interval cannot be zero".into(),
            ));
        }
        if self.session_timeout.is_zero() {
            return Err(SyncError::Config("session timeout cannot be zero".into()));
        }
        Ok(())
    }
}

/// Firewall policy knobs.
///
/// The numeric thresholds are tuning parameters, not correctness properties.
#[derive(Debug, Clone)]
pub struct FirewallConfig {
    /// Whether per-peer rate budgets are enforced.
    pub enabled: bool,

    /// Length of one rate-accounting window.
    pub rate_window: Duration,

    /// Bundles a peer may deliver per window before tripping the budget.
    pub max_bundles_per_window: u32,

    /// Bytes a peer may deliver per window before tripping the budget.
    pub max_bytes_per_window: u64,

    /// Invalid-bundle count at which a peer is banned.
    pub ban_threshold: u64,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate_window: Duration::from_secs(10),
            max_bundles_per_window: 1_000,
            max_bytes_per_window: 8 * 1024 * 1024,
            ban_threshold: 20,
        }
    }
}
