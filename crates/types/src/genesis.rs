//! Genesis document and chain parameters.

use crate::Hash;
use std::time::Duration;

/// Which network a node participates in.
///
/// The chain type is stamped on every outbound bundle; bundles from a
/// different network are rejected at the firewall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainType {
    /// The main production network.
    Mainnet,
    /// The public test network.
    Testnet,
    /// A local network for testing; bundles carry no network flag.
    Localnet,
}

impl ChainType {
    /// Whether this is the main network.
    pub fn is_mainnet(&self) -> bool {
        matches!(self, ChainType::Mainnet)
    }

    /// Whether this is the test network.
    pub fn is_testnet(&self) -> bool {
        matches!(self, ChainType::Testnet)
    }
}

/// Consensus parameters fixed at genesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainParams {
    /// Target seconds between consecutive blocks.
    pub block_interval_secs: u32,

    /// Block format version accepted by this chain.
    pub block_version: u8,
}

impl ChainParams {
    /// The block interval as a [`Duration`].
    pub fn block_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.block_interval_secs))
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            block_interval_secs: 10,
            block_version: crate::BLOCK_VERSION,
        }
    }
}

/// The genesis document: chain identity plus fixed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Genesis {
    /// Hash of the genesis document. Peers on a different genesis are banned
    /// during the handshake.
    pub hash: Hash,

    /// Which network this genesis belongs to.
    pub chain_type: ChainType,

    /// Fixed consensus parameters.
    pub params: ChainParams,
}

impl Genesis {
    /// Create a genesis document.
    pub fn new(hash: Hash, chain_type: ChainType, params: ChainParams) -> Self {
        Self {
            hash,
            chain_type,
            params,
        }
    }
}
