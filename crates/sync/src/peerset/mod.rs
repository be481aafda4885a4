//! The peer registry: per-peer accounting plus the session table.
//!
//! This is the single mutable hub of the synchronizer. Every mutation goes
//! through its API; the peer map and the session table are individually
//! synchronized so the synchronizer itself never holds a lock.

mod peer;
mod session;

pub use peer::{Peer, PeerStatus};
pub use session::Session;

use dashmap::DashMap;
use meridian_messages::{MessageType, ResponseCode};
use meridian_types::{Hash, Height, PeerId, PublicKey, Services};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime};

/// Snapshot of the registry for the host's network-info API.
#[derive(Debug, Clone)]
pub struct NetworkInfo {
    /// All known peers.
    pub peers: Vec<Peer>,

    /// Bytes sent per message type, across all peers and broadcasts.
    pub total_sent_bytes: HashMap<MessageType, u64>,

    /// Bytes received per message type, across all peers.
    pub total_received_bytes: HashMap<MessageType, u64>,
}

/// Registry of peers and their block-download sessions.
///
/// Peers are auto-created on first reference and never removed. Session ids
/// come from a per-process monotone counter; a closed id is never reused.
pub struct PeerSet {
    peers: DashMap<PeerId, Peer>,
    sessions: RwLock<HashMap<u32, Session>>,
    next_session_id: AtomicU32,
    session_timeout: Duration,
    total_sent_bytes: DashMap<MessageType, u64>,
    total_received_bytes: DashMap<MessageType, u64>,
}

impl PeerSet {
    /// Create an empty registry.
    pub fn new(session_timeout: Duration) -> Self {
        Self {
            peers: DashMap::new(),
            sessions: RwLock::new(HashMap::new()),
            next_session_id: AtomicU32::new(1),
            session_timeout,
            total_sent_bytes: DashMap::new(),
            total_received_bytes: DashMap::new(),
        }
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peer has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// A copy of one peer's row.
    pub fn get_peer(&self, peer_id: PeerId) -> Option<Peer> {
        self.peers.get(&peer_id).map(|p| p.clone())
    }

    /// Visit a snapshot of every peer.
    ///
    /// The callback receives clones, so it may freely call back into the
    /// registry (open sessions, bump counters) without deadlocking.
    pub fn iterate_peers(&self, mut f: impl FnMut(&Peer)) {
        let snapshot: Vec<Peer> = self.peers.iter().map(|p| p.clone()).collect();
        for peer in &snapshot {
            f(peer);
        }
    }

    fn with_peer(&self, peer_id: PeerId, f: impl FnOnce(&mut Peer)) {
        let mut entry = self
            .peers
            .entry(peer_id)
            .or_insert_with(|| Peer::new(peer_id));
        f(entry.value_mut());
    }

    /// Set a peer's status.
    pub fn update_status(&self, peer_id: PeerId, status: PeerStatus) {
        self.with_peer(peer_id, |p| p.status = status);
    }

    /// Record a peer's remote address.
    pub fn update_address(&self, peer_id: PeerId, address: &str) {
        self.with_peer(peer_id, |p| p.address = address.to_string());
    }

    /// Record handshake identity: moniker, agent, keys, and services.
    pub fn update_info(
        &self,
        peer_id: PeerId,
        moniker: &str,
        agent: &str,
        consensus_keys: Vec<PublicKey>,
        services: Services,
    ) {
        self.with_peer(peer_id, |p| {
            p.moniker = moniker.to_string();
            p.agent = agent.to_string();
            p.consensus_keys = consensus_keys;
            p.services = services;
        });
    }

    /// Record a peer's announced tip.
    pub fn update_height(&self, peer_id: PeerId, height: Height, block_hash: Hash) {
        self.with_peer(peer_id, |p| {
            p.height = height;
            p.last_block_hash = block_hash;
        });
    }

    /// Stamp the last-sent time.
    pub fn update_last_sent(&self, peer_id: PeerId) {
        self.with_peer(peer_id, |p| p.last_sent = Some(SystemTime::now()));
    }

    /// Stamp the last-received time.
    pub fn update_last_received(&self, peer_id: PeerId) {
        self.with_peer(peer_id, |p| p.last_received = Some(SystemTime::now()));
    }

    /// Count one received bundle.
    pub fn increase_received_bundles_counter(&self, peer_id: PeerId) {
        self.with_peer(peer_id, |p| p.received_bundles += 1);
    }

    /// Count one invalid bundle and return the peer's running total.
    pub fn increase_invalid_bundles_counter(&self, peer_id: PeerId) -> u64 {
        let mut entry = self
            .peers
            .entry(peer_id)
            .or_insert_with(|| Peer::new(peer_id));
        entry.invalid_bundles += 1;
        entry.invalid_bundles
    }

    /// Add sent bytes to the aggregate, and to a peer row when `peer_id` is
    /// set. Broadcasts pass `None` and only touch the aggregate.
    pub fn increase_sent_bytes_counter(
        &self,
        message_type: MessageType,
        bytes: u64,
        peer_id: Option<PeerId>,
    ) {
        *self.total_sent_bytes.entry(message_type).or_insert(0) += bytes;
        if let Some(pid) = peer_id {
            self.with_peer(pid, |p| {
                *p.sent_bytes.entry(message_type).or_insert(0) += bytes;
            });
        }
    }

    /// Add received bytes to the aggregate, and to a peer row when `peer_id`
    /// is set.
    pub fn increase_received_bytes_counter(
        &self,
        message_type: MessageType,
        bytes: u64,
        peer_id: Option<PeerId>,
    ) {
        *self.total_received_bytes.entry(message_type).or_insert(0) += bytes;
        if let Some(pid) = peer_id {
            self.with_peer(pid, |p| {
                *p.received_bytes.entry(message_type).or_insert(0) += bytes;
            });
        }
    }

    // ── Sessions ──

    /// Open a download session with a peer.
    ///
    /// Callers must check [`Self::has_open_session`] first; at most one open
    /// session per peer is the registry invariant.
    pub fn open_session(&self, peer_id: PeerId) -> Session {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = Session::new(id, peer_id);
        self.sessions.write().insert(id, session.clone());
        session
    }

    /// Close a session by id. Closing an unknown id is a no-op.
    pub fn close_session(&self, session_id: u32) {
        self.sessions.write().remove(&session_id);
    }

    /// Whether a session is open with this peer.
    pub fn has_open_session(&self, peer_id: PeerId) -> bool {
        self.sessions
            .read()
            .values()
            .any(|s| s.peer_id() == peer_id)
    }

    /// Whether any session is open.
    pub fn has_any_open_session(&self) -> bool {
        !self.sessions.read().is_empty()
    }

    /// Number of open sessions.
    pub fn open_session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// A copy of one session, if still open.
    pub fn get_session(&self, session_id: u32) -> Option<Session> {
        self.sessions.read().get(&session_id).cloned()
    }

    /// Record the response code a session last saw, refreshing its activity
    /// timestamp. Returns false if the session is no longer open.
    pub fn update_session_last_response_code(&self, session_id: u32, code: ResponseCode) -> bool {
        match self.sessions.write().get_mut(&session_id) {
            Some(session) => {
                session.set_last_response_code(code);
                true
            }
            None => false,
        }
    }

    /// Sweep sessions whose last activity is older than the session timeout.
    /// Returns the number of sessions closed.
    pub fn remove_expired_sessions(&self) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        let timeout = self.session_timeout;
        sessions.retain(|_, s| s.last_activity_at().elapsed() < timeout);
        before - sessions.len()
    }

    /// Snapshot for the host's network-info API.
    pub fn network_info(&self) -> NetworkInfo {
        NetworkInfo {
            peers: self.peers.iter().map(|p| p.clone()).collect(),
            total_sent_bytes: self
                .total_sent_bytes
                .iter()
                .map(|e| (*e.key(), *e.value()))
                .collect(),
            total_received_bytes: self
                .total_received_bytes
                .iter()
                .map(|e| (*e.key(), *e.value()))
                .collect(),
        }
    }
}
