//! Per-peer bookkeeping.

use meridian_messages::MessageType;
use meridian_types::{Hash, Height, PeerId, PublicKey, Services};
use std::collections::HashMap;
use std::time::SystemTime;

/// Trust level of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    /// Seen on the wire but nothing else is known.
    Unknown,
    /// Transport-level connection established.
    Connected,
    /// Completed the hello handshake.
    Known,
    /// Asserted trustworthy by the operator.
    Trusty,
    /// Banned for accumulated firewall violations.
    Banned,
    /// Connection lost.
    Disconnected,
}

/// Everything we track about one peer.
///
/// Rows are created on first observation and never destroyed while the
/// process runs. Counters are monotone non-decreasing across the peer's
/// lifetime.
#[derive(Debug, Clone)]
pub struct Peer {
    /// The peer's transport identifier.
    pub peer_id: PeerId,

    /// Current trust level.
    pub status: PeerStatus,

    /// Display name from the handshake.
    pub moniker: String,

    /// Remote software agent string.
    pub agent: String,

    /// Last observed remote address.
    pub address: String,

    /// Consensus public keys declared in the handshake.
    pub consensus_keys: Vec<PublicKey>,

    /// Services the peer advertises.
    pub services: Services,

    /// Last observed tip height.
    pub height: Height,

    /// Last observed tip hash.
    pub last_block_hash: Hash,

    /// When we last sent to this peer.
    pub last_sent: Option<SystemTime>,

    /// When we last received from this peer.
    pub last_received: Option<SystemTime>,

    /// Bundles received from this peer.
    pub received_bundles: u64,

    /// Bundles from this peer rejected by the firewall or a handler.
    pub invalid_bundles: u64,

    /// Bytes received, broken down by message type.
    pub received_bytes: HashMap<MessageType, u64>,

    /// Bytes sent, broken down by message type.
    pub sent_bytes: HashMap<MessageType, u64>,
}

impl Peer {
    /// A fresh row for a newly observed peer.
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            status: PeerStatus::Unknown,
            moniker: String::new(),
            agent: String::new(),
            address: String::new(),
            consensus_keys: Vec::new(),
            services: Services::NONE,
            height: 0,
            last_block_hash: Hash::ZERO,
            last_sent: None,
            last_received: None,
            received_bundles: 0,
            invalid_bundles: 0,
            received_bytes: HashMap::new(),
            sent_bytes: HashMap::new(),
        }
    }

    /// Whether this peer may be asked for blocks.
    pub fn is_known_or_trusty(&self) -> bool {
        matches!(self.status, PeerStatus::Known | PeerStatus::Trusty)
    }

    /// Whether this peer is banned.
    pub fn is_banned(&self) -> bool {
        self.status == PeerStatus::Banned
    }

    /// Whether this peer advertises the historical-blocks service.
    pub fn has_network_service(&self) -> bool {
        self.services.is_network()
    }
}
