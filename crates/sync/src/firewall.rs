//! Bundle admission: the node's trust boundary.
//!
//! Every inbound bundle passes through here before any handler sees it.
//! Rules run in order: structural decode, self-echo drop, network tag,
//! ban check, handshake gating, then the optional per-peer rate budget.
//! A rejected bundle bumps the initiator's invalid-bundle counter (the
//! banned-peer and self-echo drops stay silent) and yields `None`.

use crate::config::FirewallConfig;
use crate::error::SyncError;
use crate::peerset::{PeerSet, PeerStatus};
use dashmap::DashMap;
use meridian_messages::{Bundle, BundleFlags, MessageType};
use meridian_network::StreamReader;
use meridian_types::{ChainType, PeerId};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tracing::{debug, trace, warn};

/// Maximum bytes read from an inbound stream before giving up.
const MAX_STREAM_BYTES: u64 = 10 * 1024 * 1024 + 64;

/// Per-peer accounting for one rate window.
#[derive(Debug)]
struct RateWindow {
    window_start: Instant,
    bundles: u32,
    bytes: u64,
}

impl RateWindow {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            bundles: 0,
            bytes: 0,
        }
    }
}

/// Admission filter for inbound bundles.
pub struct Firewall {
    config: FirewallConfig,
    chain_type: ChainType,
    self_id: PeerId,
    peer_set: Arc<PeerSet>,
    rates: DashMap<PeerId, RateWindow>,
}

impl Firewall {
    /// Create a firewall for the given chain.
    pub fn new(
        config: FirewallConfig,
        chain_type: ChainType,
        self_id: PeerId,
        peer_set: Arc<PeerSet>,
    ) -> Self {
        Self {
            config,
            chain_type,
            self_id,
            peer_set,
            rates: DashMap::new(),
        }
    }

    /// Admit or reject a gossiped bundle.
    ///
    /// `source` is the originating peer, `from` the relay that delivered it;
    /// delivery accounting is charged to the relay.
    pub fn open_gossip_bundle(&self, data: &[u8], _source: PeerId, from: PeerId) -> Option<Bundle> {
        self.open_bundle(data, from)
    }

    /// Admit or reject a bundle arriving on a direct stream.
    ///
    /// Reads the stream to its end (bounded); the caller drops the reader,
    /// which closes it.
    pub async fn open_stream_bundle(
        &self,
        reader: &mut StreamReader,
        source: PeerId,
    ) -> Option<Bundle> {
        let mut data = Vec::new();
        let mut limited = reader.take(MAX_STREAM_BYTES);
        if let Err(err) = limited.read_to_end(&mut data).await {
            warn!(source = %source, error = %err, "failed to read stream bundle");
            self.count_invalid(source);
            return None;
        }
        self.open_bundle(&data, source)
    }

    fn open_bundle(&self, data: &[u8], via: PeerId) -> Option<Bundle> {
        self.peer_set.update_last_received(via);
        self.peer_set.increase_received_bundles_counter(via);

        let bundle = match Bundle::decode(data) {
            Ok(bundle) => bundle,
            Err(err) => {
                let err = SyncError::Bundle(err);
                debug!(peer = %via, error = %err, "bundle failed to decode");
                self.count_invalid(via);
                return None;
            }
        };

        self.peer_set.increase_received_bytes_counter(
            bundle.message.message_type(),
            data.len() as u64,
            Some(via),
        );

        // Our own broadcasts echo back through gossip; drop them silently.
        if bundle.initiator == self.self_id {
            return None;
        }

        if let Err(err) = self.check_bundle(&bundle) {
            match err {
                // Banned peers are ignored, not counted.
                SyncError::PeerBanned(initiator) => {
                    trace!(initiator = %initiator, "dropping bundle from banned peer");
                }
                err => {
                    debug!(
                        initiator = %bundle.initiator,
                        bundle = %bundle,
                        error = %err,
                        "bundle rejected"
                    );
                    self.count_invalid(bundle.initiator);
                }
            }
            return None;
        }

        if self.config.enabled && !self.within_rate_budget(via, data.len() as u64) {
            debug!(peer = %via, "peer exceeded its rate budget");
            self.count_invalid(via);
            return None;
        }

        Some(bundle)
    }

    /// Apply the admission rules to a decoded bundle.
    fn check_bundle(&self, bundle: &Bundle) -> Result<(), SyncError> {
        if !self.network_tag_matches(bundle.flags) {
            return Err(SyncError::NetworkMismatch);
        }

        let initiator = self.peer_set.get_peer(bundle.initiator);
        if initiator.as_ref().is_some_and(|p| p.is_banned()) {
            return Err(SyncError::PeerBanned(bundle.initiator));
        }

        let handshaking = matches!(
            bundle.message.message_type(),
            MessageType::Hello | MessageType::HelloAck
        );
        let completed_hello = initiator.as_ref().is_some_and(|p| p.is_known_or_trusty());
        if !handshaking && !completed_hello {
            return Err(SyncError::InvalidMessage(
                "peer has not completed the hello handshake".into(),
            ));
        }

        Ok(())
    }

    fn network_tag_matches(&self, flags: BundleFlags) -> bool {
        match self.chain_type {
            ChainType::Mainnet => {
                flags.contains(BundleFlags::NETWORK_MAINNET)
                    && !flags.contains(BundleFlags::NETWORK_TESTNET)
            }
            ChainType::Testnet => {
                flags.contains(BundleFlags::NETWORK_TESTNET)
                    && !flags.contains(BundleFlags::NETWORK_MAINNET)
            }
            // Localnet accepts anything; it exists for testing.
            ChainType::Localnet => true,
        }
    }

    /// Charge one bundle of `bytes` against the peer's window; false when
    /// the budget is exhausted.
    fn within_rate_budget(&self, peer_id: PeerId, bytes: u64) -> bool {
        let mut window = self.rates.entry(peer_id).or_insert_with(RateWindow::new);
        if window.window_start.elapsed() >= self.config.rate_window {
            *window = RateWindow::new();
        }
        window.bundles += 1;
        window.bytes += bytes;
        window.bundles <= self.config.max_bundles_per_window
            && window.bytes <= self.config.max_bytes_per_window
    }

    /// Count a violation; peers that accumulate enough are banned.
    fn count_invalid(&self, peer_id: PeerId) {
        let count = self.peer_set.increase_invalid_bundles_counter(peer_id);
        if count >= self.config.ban_threshold {
            warn!(peer = %peer_id, invalid_bundles = count, "banning peer");
            self.peer_set.update_status(peer_id, PeerStatus::Banned);
        }
    }
}
