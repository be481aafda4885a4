//! The synchronizer: event loop, dispatch, and the catch-up algorithm.
//!
//! The sync module is pull-oriented: the network does not push a node up to
//! date; the node updates itself by requesting blocks from suitable peers.
//!
//! The synchronizer holds no locks. All shared substructures (peer set,
//! cache, session table) are individually thread-safe, which keeps the event
//! loop free of lock-ordering hazards with the state and consensus
//! collaborators.

use crate::cache::Cache;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::firewall::Firewall;
use crate::handlers::{build_handler_table, HandlerEntry};
use crate::peerset::{PeerSet, PeerStatus};
use crate::traits::{Consensus, StateFacade};
use meridian_messages::{
    BlocksRequestMessage, Bundle, BundleFlags, HelloMessage, Message, MessageType,
};
use meridian_network::{Network, NetworkEvent};
use meridian_types::{ChainType, Height, PeerId, Services, ValidatorKey};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// The synchronizer's shared state and logic.
///
/// Handlers receive a borrowed `SyncCore` on every call; they never own it,
/// so there are no reference cycles between the core and its handler table.
pub struct SyncCore {
    config: SyncConfig,
    validator_keys: Vec<ValidatorKey>,
    state: Arc<dyn StateFacade>,
    consensus: Arc<dyn Consensus>,
    network: Arc<dyn Network>,
    peer_set: Arc<PeerSet>,
    cache: Cache,
    firewall: Firewall,
    handlers: HashMap<MessageType, HandlerEntry>,
}

impl SyncCore {
    /// The synchronizer configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The ledger collaborator.
    pub fn state(&self) -> &dyn StateFacade {
        &*self.state
    }

    /// The consensus collaborator.
    pub fn consensus(&self) -> &dyn Consensus {
        &*self.consensus
    }

    /// The peer registry.
    pub fn peer_set(&self) -> &PeerSet {
        &self.peer_set
    }

    /// The block/certificate cache.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Our transport identity.
    pub fn self_id(&self) -> PeerId {
        self.network.self_id()
    }

    /// Our configured display name.
    pub fn moniker(&self) -> &str {
        &self.config.moniker
    }

    /// Dispatch one admitted bundle to its handler.
    pub fn process_incoming_bundle(&self, bundle: &Bundle) -> Result<(), SyncError> {
        debug!(initiator = %bundle.initiator, bundle = %bundle, "received a bundle");

        let entry = self
            .handlers
            .get(&bundle.message.message_type())
            .ok_or_else(|| {
                SyncError::InvalidMessage(format!(
                    "no handler for message type {}",
                    bundle.message.message_type()
                ))
            })?;
        (entry.parse)(self, &bundle.message, bundle.initiator)
    }

    /// Wrap an outbound message, stamping the carrier and network flags.
    ///
    /// Returns `None` when the type's handler suppresses the send.
    pub fn prepare_bundle(&self, message: Message) -> Option<Bundle> {
        let entry = self.handlers.get(&message.message_type())?;
        let mut bundle = (entry.prepare)(self, message)?;

        // Bundles are carried over libp2p; stamp the carrier and our chain.
        bundle.flags.set(BundleFlags::CARRIER_LIBP2P);
        match self.state.genesis().chain_type {
            ChainType::Mainnet => bundle.flags.set(BundleFlags::NETWORK_MAINNET),
            ChainType::Testnet => bundle.flags.set(BundleFlags::NETWORK_TESTNET),
            ChainType::Localnet => {}
        }

        Some(bundle)
    }

    /// Send a message to one peer, updating send accounting.
    pub fn send_to(&self, message: Message, to: PeerId) -> Result<(), SyncError> {
        let message_type = message.message_type();
        if let Some(bundle) = self.prepare_bundle(message) {
            let data = bundle.encode();
            self.peer_set.update_last_sent(to);
            self.peer_set
                .increase_sent_bytes_counter(message_type, data.len() as u64, Some(to));

            self.network.send_to(data, to)?;
            debug!(to = %to, bundle = %bundle, "sent bundle to peer");
        }
        Ok(())
    }

    /// Broadcast a message on its topic, updating aggregate accounting.
    pub fn broadcast(&self, message: Message) {
        let message_type = message.message_type();
        let topic = message.topic();
        if let Some(mut bundle) = self.prepare_bundle(message) {
            bundle.flags.set(BundleFlags::BROADCASTED);
            let data = bundle.encode();
            let len = data.len() as u64;

            match self.network.broadcast(data, topic) {
                Ok(()) => debug!(bundle = %bundle, "broadcast bundle"),
                Err(err) => {
                    error!(bundle = %bundle, error = %err, "error on broadcasting bundle")
                }
            }
            self.peer_set
                .increase_sent_bytes_counter(message_type, len, None);
        }
    }

    /// Greet a newly connected stream-capable peer.
    pub fn say_hello(&self, to: PeerId) -> Result<(), SyncError> {
        let mut services = Services::NONE;
        if self.config.node_network {
            services = services | Services::NETWORK;
        }

        let mut msg = HelloMessage::new(
            self.self_id(),
            crate::agent(),
            self.config.moniker.clone(),
            self.state.last_block_height(),
            self.state.last_block_hash(),
            self.state.genesis().hash,
            services,
        );
        msg.sign(&self.validator_keys);

        info!(to = %to, "sending hello message");
        self.send_to(Message::Hello(msg), to)
    }

    /// Decide whether we are behind the network and start downloads if so.
    ///
    /// Runs on block announces and on the housekeeping tick. Both run inline
    /// on the receive-loop task, so the open-session guard below cannot race
    /// with a session being opened between the check and the downloads.
    pub fn update_blockchain(&self) {
        // An open session means a download is already in flight; asking
        // another peer for the same blocks would only waste both ends.
        if self.peer_set.has_any_open_session() {
            debug!("not syncing, we have open sessions");
            return;
        }

        let interval = self.state.params().block_interval().as_secs().max(1);
        let now = unix_now();
        let current_round = now - (now % interval);
        let last_block_time = self.state.last_block_time();
        let expected_blocks = current_round.saturating_sub(last_block_time) / interval;

        if expected_blocks <= 1 {
            // We are in sync.
            return;
        }

        // Advance the cursor past blocks already downloaded into the cache.
        let mut height = self.state.last_block_height();
        while self.cache.has_block_in_cache(height + 1) {
            height += 1;
        }

        info!(expected_blocks, from = height, "start syncing with the network");
        let only_node_network = expected_blocks > u64::from(self.config.latest_block_interval);
        self.download_blocks(height, only_node_network);
    }

    /// Fan out block-download sessions across eligible peers.
    fn download_blocks(&self, mut from: Height, only_node_network: bool) {
        debug!(from, only_node_network, "downloading blocks");

        self.peer_set.iterate_peers(|peer| {
            // One open session per peer; spreading ranges over distinct
            // peers is the point of the fan-out.
            if self.peer_set.has_open_session(peer.peer_id) {
                return;
            }

            if !peer.is_known_or_trusty() {
                return;
            }

            if only_node_network && !peer.has_network_service() {
                // Deep catch-up needs full-history peers; make room for one.
                self.network.close_connection(peer.peer_id);
                return;
            }

            let count = self.config.latest_block_interval;
            let session = self.peer_set.open_session(peer.peer_id);
            debug!(
                peer = %peer.peer_id,
                session = session.session_id(),
                from = from + 1,
                count,
                "sending download request"
            );

            let msg = Message::BlocksRequest(BlocksRequestMessage {
                session_id: session.session_id(),
                from: from + 1,
                count,
            });
            match self.send_to(msg, peer.peer_id) {
                Ok(()) => from += count,
                Err(err) => {
                    warn!(peer = %peer.peer_id, error = %err, "download request failed");
                    self.peer_set.close_session(session.session_id());
                }
            }
        });
    }

    /// Commit every consecutive block the cache can supply.
    ///
    /// Commits are strictly monotone by height; the pump stops at the first
    /// gap or error. Errors are surfaced to the caller, never swallowed.
    pub fn try_commit_blocks(&self) -> Result<(), SyncError> {
        let mut height = self.state.last_block_height() + 1;
        loop {
            let Some(block) = self.cache.get_block(height) else {
                break;
            };
            let Some(certificate) = self.cache.get_certificate(height) else {
                break;
            };

            let mut block = (*block).clone();
            for transaction in &mut block.transactions {
                if transaction.is_public_key_stripped() {
                    let public_key = self
                        .state
                        .public_key(&transaction.signer)
                        .ok_or(SyncError::UnknownPublicKey(transaction.signer))?;
                    transaction.set_public_key(public_key);
                }
            }

            block.basic_check()?;
            certificate.basic_check()?;

            trace!(height, "committing block");
            self.state.commit_block(block, certificate)?;
            height += 1;
        }

        self.move_consensus_to_new_height();
        Ok(())
    }

    /// Nudge consensus when the state has caught up with it.
    pub fn move_consensus_to_new_height(&self) {
        let state_height = self.state.last_block_height();
        let (consensus_height, _) = self.consensus.height_round();
        if state_height >= consensus_height {
            self.consensus.move_to_new_height();
        }
    }

    /// Fetch the raw encodings of committed blocks `[from, from + count)`.
    ///
    /// Returns `None` when `from` is beyond our tip, or when any block in
    /// the clamped range is missing from the store (an inconsistency).
    pub fn prepare_blocks(&self, from: Height, mut count: u32) -> Option<Vec<Vec<u8>>> {
        let our_height = self.state.last_block_height();

        if from == 0 || from > our_height {
            debug!(height = from, "we don't have blocks at this height");
            return None;
        }
        if from.saturating_add(count) > our_height {
            count = our_height - from + 1;
        }

        let mut blocks = Vec::with_capacity(count as usize);
        for height in from..from + count {
            match self.state.committed_block(height) {
                Some(committed) => blocks.push(committed.data),
                None => {
                    warn!(height, "unable to find a committed block");
                    return None;
                }
            }
        }

        Some(blocks)
    }

    /// One housekeeping pass: sweep dead sessions, re-check catch-up.
    fn housekeeping(&self) {
        let swept = self.peer_set.remove_expired_sessions();
        if swept > 0 {
            debug!(swept, "closed expired sessions");
        }
        trace!(status = %self, "housekeeping tick");
        self.update_blockchain();
    }

    async fn handle_network_event(&self, event: NetworkEvent) {
        match event {
            NetworkEvent::Gossip { data, source, from } => {
                if let Some(bundle) = self.firewall.open_gossip_bundle(&data, source, from) {
                    self.dispatch_bundle(&bundle);
                }
            }
            NetworkEvent::Stream { source, mut reader } => {
                if let Some(bundle) = self.firewall.open_stream_bundle(&mut reader, source).await {
                    self.dispatch_bundle(&bundle);
                }
                // Dropping the reader closes the stream on every exit path.
            }
            NetworkEvent::Connect {
                peer,
                remote_address,
                support_stream,
            } => {
                debug!(peer = %peer, address = %remote_address, "peer connected");
                self.peer_set.update_status(peer, PeerStatus::Connected);
                self.peer_set.update_address(peer, &remote_address);

                if support_stream {
                    if let Err(err) = self.say_hello(peer) {
                        warn!(to = %peer, error = %err, "sending hello message failed");
                    }
                }
            }
            NetworkEvent::Disconnect { peer } => {
                debug!(peer = %peer, "peer disconnected");
                self.peer_set.update_status(peer, PeerStatus::Disconnected);
            }
        }
    }

    fn dispatch_bundle(&self, bundle: &Bundle) {
        if let Err(err) = self.process_incoming_bundle(bundle) {
            warn!(
                initiator = %bundle.initiator,
                bundle = %bundle,
                error = %err,
                "error on parsing a bundle"
            );
            self.peer_set
                .increase_invalid_bundles_counter(bundle.initiator);
        }
    }
}

impl fmt::Display for SyncCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{peers: {}, cached: {}}}",
            self.peer_set.len(),
            self.cache.len()
        )
    }
}

/// The synchronizer: owns the core and drives the two event loops.
pub struct Synchronizer {
    core: Arc<SyncCore>,
    cancel: CancellationToken,
    network_rx: Option<mpsc::Receiver<NetworkEvent>>,
    broadcast_rx: Option<mpsc::Receiver<Message>>,
}

impl Synchronizer {
    /// Construct a synchronizer.
    ///
    /// `network_rx` carries transport events; `broadcast_rx` carries
    /// application-originated outbound messages (from the consensus engine).
    pub fn new(
        config: SyncConfig,
        validator_keys: Vec<ValidatorKey>,
        state: Arc<dyn StateFacade>,
        consensus: Arc<dyn Consensus>,
        network: Arc<dyn Network>,
        network_rx: mpsc::Receiver<NetworkEvent>,
        broadcast_rx: mpsc::Receiver<Message>,
    ) -> Result<Self, SyncError> {
        config.basic_check()?;

        let peer_set = Arc::new(PeerSet::new(config.session_timeout));
        let cache = Cache::new(config.cache_size)?;
        let firewall = Firewall::new(
            config.firewall.clone(),
            state.genesis().chain_type,
            network.self_id(),
            peer_set.clone(),
        );

        let core = Arc::new(SyncCore {
            config,
            validator_keys,
            state,
            consensus,
            network,
            peer_set,
            cache,
            firewall,
            handlers: build_handler_table(),
        });

        Ok(Self {
            core,
            cancel: CancellationToken::new(),
            network_rx: Some(network_rx),
            broadcast_rx: Some(broadcast_rx),
        })
    }

    /// Join the transport topics and launch the receive and broadcast loops.
    pub fn start(&mut self) -> Result<(), SyncError> {
        self.core.network.join_general_topic()?;
        self.core.network.join_consensus_topic()?;

        let network_rx = self
            .network_rx
            .take()
            .ok_or_else(|| SyncError::Config("synchronizer already started".into()))?;
        let broadcast_rx = self
            .broadcast_rx
            .take()
            .ok_or_else(|| SyncError::Config("synchronizer already started".into()))?;

        tokio::spawn(receive_loop(
            self.core.clone(),
            network_rx,
            self.cancel.clone(),
        ));
        tokio::spawn(broadcast_loop(
            self.core.clone(),
            broadcast_rx,
            self.cancel.clone(),
        ));

        Ok(())
    }

    /// Signal both loops to exit.
    pub fn stop(&self) {
        info!("stopping synchronizer");
        self.cancel.cancel();
    }

    /// The peer registry, for the host's info surfaces.
    pub fn peer_set(&self) -> &PeerSet {
        self.core.peer_set()
    }

    /// Our configured display name.
    pub fn moniker(&self) -> &str {
        self.core.moniker()
    }

    /// Our transport identity.
    pub fn self_id(&self) -> PeerId {
        self.core.self_id()
    }
}

/// Drain transport events until cancelled.
///
/// The housekeeping interval doubles as the session sweeper and the
/// timer-driven catch-up check; its cadence is half the session timeout.
async fn receive_loop(
    core: Arc<SyncCore>,
    mut network_rx: mpsc::Receiver<NetworkEvent>,
    cancel: CancellationToken,
) {
    let cadence = core.config.session_timeout / 2;
    let mut housekeeping =
        tokio::time::interval_at(tokio::time::Instant::now() + cadence, cadence);
    housekeeping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("receive loop stopped");
                return;
            }

            event = network_rx.recv() => {
                match event {
                    Some(event) => core.handle_network_event(event).await,
                    None => {
                        debug!("network event channel closed");
                        return;
                    }
                }
            }

            _ = housekeeping.tick() => {
                core.housekeeping();
            }
        }
    }
}

/// Drain application-originated messages and broadcast them until cancelled.
async fn broadcast_loop(
    core: Arc<SyncCore>,
    mut broadcast_rx: mpsc::Receiver<Message>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("broadcast loop stopped");
                return;
            }

            message = broadcast_rx.recv() => {
                match message {
                    Some(message) => core.broadcast(message),
                    None => {
                        debug!("broadcast channel closed");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FirewallConfig;
    use crate::test_utils::{generate_test_block, MockConsensus, MockState};
    use meridian_messages::{
        BlockAnnounceMessage, BlocksResponseMessage, HelloAckMessage, ProposalMessage,
        QueryProposalMessage, QueryVotesMessage, ResponseCode, TransactionsMessage, VoteMessage,
    };
    use meridian_network::memory::{MemoryNetwork, PublishedData};
    use meridian_network::{NetworkError, StreamReader, TopicId};
    use meridian_types::{Hash, Proposal, Signature, Vote};
    use std::time::Duration;

    struct TestNode {
        sync: Synchronizer,
        state: Arc<MockState>,
        consensus: Arc<MockConsensus>,
        network: Arc<MemoryNetwork>,
        publish_rx: mpsc::UnboundedReceiver<PublishedData>,
        network_tx: mpsc::Sender<NetworkEvent>,
        broadcast_tx: mpsc::Sender<Message>,
    }

    impl TestNode {
        fn core(&self) -> &SyncCore {
            &self.sync.core
        }
    }

    fn test_config() -> SyncConfig {
        SyncConfig {
            moniker: "alice".into(),
            session_timeout: Duration::from_secs(1),
            node_network: true,
            block_per_message: 11,
            cache_size: 1000,
            latest_block_interval: 23,
            firewall: FirewallConfig::default(),
        }
    }

    async fn setup() -> TestNode {
        setup_with(test_config()).await
    }

    async fn setup_with(config: SyncConfig) -> TestNode {
        let state = MockState::new(ChainType::Testnet);
        let consensus = MockConsensus::new();
        let (network, publish_rx) = MemoryNetwork::new(PeerId::random());
        let network = Arc::new(network);
        let (network_tx, network_rx) = mpsc::channel(64);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(64);
        let validator_keys = vec![ValidatorKey::generate(), ValidatorKey::generate()];

        let mut sync = Synchronizer::new(
            config,
            validator_keys,
            state.clone(),
            consensus.clone(),
            network.clone(),
            network_rx,
            broadcast_rx,
        )
        .expect("synchronizer construction");
        sync.start().expect("synchronizer start");

        assert!(network.joined_general());
        assert!(network.joined_consensus());

        TestNode {
            sync,
            state,
            consensus,
            network,
            publish_rx,
            network_tx,
            broadcast_tx,
        }
    }

    /// Wait for a published bundle of the given type, checking the flag
    /// invariants on every bundle seen along the way.
    async fn should_publish_message_with_this_type(
        node: &mut TestNode,
        message_type: MessageType,
    ) -> (Bundle, Option<PeerId>) {
        tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                let published = node.publish_rx.recv().await.expect("publish channel closed");
                let bundle = Bundle::decode(&published.data).expect("published bundle decodes");

                assert_eq!(bundle.initiator, node.network.self_id());
                assert!(bundle.flags.contains(BundleFlags::CARRIER_LIBP2P));
                assert!(bundle.flags.contains(BundleFlags::NETWORK_TESTNET));
                assert!(!bundle.flags.contains(BundleFlags::NETWORK_MAINNET));

                if published.target.is_none() {
                    assert!(bundle.flags.contains(BundleFlags::BROADCASTED));
                } else {
                    assert!(!bundle.flags.contains(BundleFlags::BROADCASTED));
                }

                let handshaking = matches!(
                    bundle.message.message_type(),
                    MessageType::Hello | MessageType::HelloAck
                );
                assert_eq!(bundle.flags.contains(BundleFlags::HANDSHAKING), handshaking);

                if bundle.message.message_type() == message_type {
                    return (bundle, published.target);
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for a {message_type} message"))
    }

    /// Assert no bundle of the given type is published within a short grace
    /// period.
    async fn should_not_publish_message_with_this_type(
        node: &mut TestNode,
        message_type: MessageType,
    ) {
        let result = tokio::time::timeout(Duration::from_millis(10), async {
            loop {
                let published = node.publish_rx.recv().await.expect("publish channel closed");
                let bundle = Bundle::decode(&published.data).expect("published bundle decodes");
                assert_ne!(
                    bundle.message.message_type(),
                    message_type,
                    "did not expect a {message_type} message"
                );
            }
        })
        .await;
        assert!(result.is_err(), "expected silence, got messages");
    }

    fn receiving_new_message(
        node: &TestNode,
        message: Message,
        from: PeerId,
    ) -> Result<(), SyncError> {
        let mut bundle = Bundle::new(from, message);
        bundle.flags.set(BundleFlags::CARRIER_LIBP2P);
        bundle.flags.set(BundleFlags::NETWORK_TESTNET);
        node.core().process_incoming_bundle(&bundle)
    }

    fn add_peer(node: &TestNode, services: Services) -> PeerId {
        let pid = PeerId::random();
        let key = ValidatorKey::generate();
        node.core().peer_set().update_info(
            pid,
            "peer",
            &crate::agent(),
            vec![key.public_key()],
            services,
        );
        node.core().peer_set().update_status(pid, PeerStatus::Known);
        pid
    }

    fn signed_hello(node: &TestNode, pid: PeerId, keys: &[ValidatorKey]) -> HelloMessage {
        let mut msg = HelloMessage::new(
            pid,
            crate::agent(),
            "bob".into(),
            100,
            Hash::from_bytes(b"peer tip"),
            node.state.genesis().hash,
            Services::NETWORK,
        );
        msg.sign(keys);
        msg
    }

    // ── Lifecycle ──

    #[tokio::test]
    async fn test_stop() {
        let mut node = setup().await;
        node.sync.stop();

        // Events queued after the stop signal are never processed.
        node.network_tx
            .send(NetworkEvent::Connect {
                peer: PeerId::random(),
                remote_address: "address_1".into(),
                support_stream: true,
            })
            .await
            .unwrap();
        should_not_publish_message_with_this_type(&mut node, MessageType::Hello).await;
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut node = setup().await;
        assert!(node.sync.start().is_err());
    }

    #[tokio::test]
    async fn test_moniker() {
        let node = setup().await;
        assert_eq!(node.sync.moniker(), "alice");
    }

    // ── Connect / disconnect events ──

    #[tokio::test]
    async fn test_says_hello_on_stream_connect() {
        let mut node = setup().await;
        let pid = PeerId::random();

        node.network_tx
            .send(NetworkEvent::Connect {
                peer: pid,
                remote_address: "address_1".into(),
                support_stream: true,
            })
            .await
            .unwrap();

        let (bundle, target) =
            should_publish_message_with_this_type(&mut node, MessageType::Hello).await;
        assert_eq!(target, Some(pid));
        let Message::Hello(hello) = bundle.message else {
            unreachable!()
        };
        assert_eq!(hello.moniker, "alice");
        assert!(hello.services.is_network());
        assert!(hello.verify_signature());

        let peer = node.sync.peer_set().get_peer(pid).unwrap();
        assert_eq!(peer.status, PeerStatus::Connected);
        assert_eq!(peer.address, "address_1");
    }

    #[tokio::test]
    async fn test_no_hello_without_stream_support() {
        let mut node = setup().await;
        let pid = PeerId::random();

        node.network_tx
            .send(NetworkEvent::Connect {
                peer: pid,
                remote_address: "address_1".into(),
                support_stream: false,
            })
            .await
            .unwrap();

        should_not_publish_message_with_this_type(&mut node, MessageType::Hello).await;

        let peer = node.sync.peer_set().get_peer(pid).unwrap();
        assert_eq!(peer.status, PeerStatus::Connected);
        assert_eq!(peer.address, "address_1");
    }

    #[tokio::test]
    async fn test_disconnect_event() {
        let mut node = setup().await;
        let pid = PeerId::random();

        node.network_tx
            .send(NetworkEvent::Connect {
                peer: pid,
                remote_address: "address_1".into(),
                support_stream: false,
            })
            .await
            .unwrap();
        node.network_tx
            .send(NetworkEvent::Disconnect { peer: pid })
            .await
            .unwrap();

        should_not_publish_message_with_this_type(&mut node, MessageType::Hello).await;
        assert_eq!(
            node.sync.peer_set().get_peer(pid).unwrap().status,
            PeerStatus::Disconnected
        );
    }

    // ── Outbound flag invariants ──

    #[tokio::test]
    async fn test_testnet_flags() {
        let node = setup().await;
        let bundle = node
            .core()
            .prepare_bundle(Message::QueryProposal(QueryProposalMessage {
                height: 10,
                round: 0,
            }))
            .unwrap();

        assert!(bundle.flags.contains(BundleFlags::CARRIER_LIBP2P));
        assert!(bundle.flags.contains(BundleFlags::NETWORK_TESTNET));
        assert!(!bundle.flags.contains(BundleFlags::NETWORK_MAINNET));
    }

    #[tokio::test]
    async fn test_mainnet_flags() {
        let state = MockState::new(ChainType::Mainnet);
        let consensus = MockConsensus::new();
        let (network, _publish_rx) = MemoryNetwork::new(PeerId::random());
        let (_network_tx, network_rx) = mpsc::channel(8);
        let (_broadcast_tx, broadcast_rx) = mpsc::channel(8);

        let sync = Synchronizer::new(
            test_config(),
            vec![ValidatorKey::generate()],
            state,
            consensus,
            Arc::new(network),
            network_rx,
            broadcast_rx,
        )
        .unwrap();

        let bundle = sync
            .core
            .prepare_bundle(Message::QueryProposal(QueryProposalMessage {
                height: 10,
                round: 0,
            }))
            .unwrap();
        assert!(bundle.flags.contains(BundleFlags::NETWORK_MAINNET));
        assert!(!bundle.flags.contains(BundleFlags::NETWORK_TESTNET));
    }

    // ── Block download ──

    #[tokio::test]
    async fn test_download() {
        let mut node = setup().await;
        let (block, certificate) = generate_test_block(89);
        let announce = Message::BlockAnnounce(BlockAnnounceMessage {
            height: 89,
            block,
            certificate,
        });
        let pid = PeerId::random();

        // An unknown peer announces: no download request goes out.
        receiving_new_message(&node, announce.clone(), pid).unwrap();
        should_not_publish_message_with_this_type(&mut node, MessageType::BlocksRequest).await;

        // The peer is known but advertises no network service: still no
        // request, and the deep catch-up path drops the connection.
        node.core()
            .peer_set()
            .update_info(pid, "peer", &crate::agent(), vec![], Services::NONE);
        node.core().peer_set().update_status(pid, PeerStatus::Known);
        receiving_new_message(&node, announce.clone(), pid).unwrap();
        should_not_publish_message_with_this_type(&mut node, MessageType::BlocksRequest).await;
        assert!(node.network.closed_connections().contains(&pid));

        // Now the peer advertises the network service: one session opens.
        node.core().peer_set().update_info(
            pid,
            "peer",
            &crate::agent(),
            vec![],
            Services::NETWORK,
        );
        receiving_new_message(&node, announce.clone(), pid).unwrap();
        let (bundle, target) =
            should_publish_message_with_this_type(&mut node, MessageType::BlocksRequest).await;
        assert_eq!(target, Some(pid));
        let Message::BlocksRequest(req) = bundle.message else {
            unreachable!()
        };
        assert_eq!(req.from, node.state.last_block_height() + 1);
        assert_eq!(req.count, 23);
        assert!(node.sync.peer_set().has_open_session(pid));

        node.sync.peer_set().close_session(req.session_id);

        // A rejected response closes the session and retries elsewhere.
        let session = node.sync.peer_set().open_session(pid);
        receiving_new_message(
            &node,
            Message::BlocksResponse(BlocksResponseMessage {
                code: ResponseCode::Rejected,
                reason: "no blocks for you".into(),
                session_id: session.session_id(),
                from: 1,
                blocks_data: vec![],
                last_certificate: None,
            }),
            pid,
        )
        .unwrap();
        assert!(node.sync.peer_set().get_session(session.session_id()).is_none());
        let (bundle, _) =
            should_publish_message_with_this_type(&mut node, MessageType::BlocksRequest).await;
        let Message::BlocksRequest(req) = bundle.message else {
            unreachable!()
        };
        assert!(req.session_id > session.session_id());
        node.sync.peer_set().close_session(req.session_id);

        // A send failure closes the just-opened session again.
        node.network
            .inject_send_error(NetworkError::SendFailed("send error".into()));
        receiving_new_message(&node, announce, pid).unwrap();
        should_not_publish_message_with_this_type(&mut node, MessageType::BlocksRequest).await;
        assert!(!node.sync.peer_set().has_open_session(pid));
        assert_eq!(node.sync.peer_set().open_session_count(), 0);
        node.network.clear_send_error();
    }

    #[tokio::test]
    async fn test_no_download_while_session_open() {
        let mut node = setup().await;
        let pid = add_peer(&node, Services::NETWORK);
        let other = add_peer(&node, Services::NETWORK);

        // A stale session with some other peer blocks new downloads.
        node.sync.peer_set().open_session(other);

        let (block, certificate) = generate_test_block(50);
        receiving_new_message(
            &node,
            Message::BlockAnnounce(BlockAnnounceMessage {
                height: 50,
                block,
                certificate,
            }),
            pid,
        )
        .unwrap();
        should_not_publish_message_with_this_type(&mut node, MessageType::BlocksRequest).await;
    }

    #[tokio::test]
    async fn test_no_download_when_synced() {
        let mut node = setup().await;
        let pid = add_peer(&node, Services::NETWORK);

        // Pretend our tip is fresh.
        node.state.set_last_block_time(unix_now());

        let (block, certificate) = generate_test_block(50);
        receiving_new_message(
            &node,
            Message::BlockAnnounce(BlockAnnounceMessage {
                height: 50,
                block,
                certificate,
            }),
            pid,
        )
        .unwrap();
        should_not_publish_message_with_this_type(&mut node, MessageType::BlocksRequest).await;
    }

    // ── Handshake ──

    #[tokio::test]
    async fn test_hello_promotes_peer_and_acks() {
        let mut node = setup().await;
        let pid = PeerId::random();
        let keys = vec![ValidatorKey::generate()];

        receiving_new_message(&node, Message::Hello(signed_hello(&node, pid, &keys)), pid)
            .unwrap();

        let (_, target) =
            should_publish_message_with_this_type(&mut node, MessageType::HelloAck).await;
        assert_eq!(target, Some(pid));

        let peer = node.sync.peer_set().get_peer(pid).unwrap();
        assert_eq!(peer.status, PeerStatus::Known);
        assert_eq!(peer.moniker, "bob");
        assert_eq!(peer.height, 100);
        assert_eq!(peer.consensus_keys, vec![keys[0].public_key()]);
        assert!(peer.has_network_service());
    }

    #[tokio::test]
    async fn test_hello_with_different_genesis_bans_peer() {
        let mut node = setup().await;
        let pid = PeerId::random();
        let keys = vec![ValidatorKey::generate()];

        let mut msg = signed_hello(&node, pid, &keys);
        msg.genesis_hash = Hash::from_bytes(b"some other chain");
        msg.sign(&keys);

        let err = receiving_new_message(&node, Message::Hello(msg), pid).unwrap_err();
        assert!(matches!(err, SyncError::InvalidGenesisHash(_)));
        assert!(node.sync.peer_set().get_peer(pid).unwrap().is_banned());
        should_not_publish_message_with_this_type(&mut node, MessageType::HelloAck).await;
    }

    #[tokio::test]
    async fn test_hello_with_bad_signature_bans_peer() {
        let mut node = setup().await;
        let pid = PeerId::random();
        let keys = vec![ValidatorKey::generate()];

        let mut msg = signed_hello(&node, pid, &keys);
        msg.height += 1; // tamper after signing

        let err = receiving_new_message(&node, Message::Hello(msg), pid).unwrap_err();
        assert!(matches!(err, SyncError::InvalidSignature));
        assert!(node.sync.peer_set().get_peer(pid).unwrap().is_banned());
        should_not_publish_message_with_this_type(&mut node, MessageType::HelloAck).await;
    }

    #[tokio::test]
    async fn test_hello_ack_marks_peer_known() {
        let node = setup().await;
        let pid = PeerId::random();

        receiving_new_message(
            &node,
            Message::HelloAck(HelloAckMessage { height: 12 }),
            pid,
        )
        .unwrap();
        assert_eq!(
            node.sync.peer_set().get_peer(pid).unwrap().status,
            PeerStatus::Known
        );
    }

    // ── Consensus traffic ──

    #[tokio::test]
    async fn test_query_proposal_served_when_available() {
        let mut node = setup().await;
        let pid = add_peer(&node, Services::NONE);

        let proposal = Proposal {
            height: 5,
            round: 1,
            block_data: vec![1, 2, 3],
            signature: Signature::zero(),
        };
        node.consensus.store_proposal(proposal.clone());

        receiving_new_message(
            &node,
            Message::QueryProposal(QueryProposalMessage { height: 5, round: 1 }),
            pid,
        )
        .unwrap();

        let (bundle, target) =
            should_publish_message_with_this_type(&mut node, MessageType::Proposal).await;
        assert_eq!(target, Some(pid));
        let Message::Proposal(reply) = bundle.message else {
            unreachable!()
        };
        assert_eq!(reply.proposal, proposal);
    }

    #[tokio::test]
    async fn test_query_proposal_ignored_when_missing() {
        let mut node = setup().await;
        let pid = add_peer(&node, Services::NONE);

        receiving_new_message(
            &node,
            Message::QueryProposal(QueryProposalMessage { height: 5, round: 1 }),
            pid,
        )
        .unwrap();
        should_not_publish_message_with_this_type(&mut node, MessageType::Proposal).await;
    }

    #[tokio::test]
    async fn test_proposal_for_active_round_is_set() {
        let node = setup().await;
        let pid = add_peer(&node, Services::NONE);
        node.consensus.set_height_round(9, 0);

        let proposal = Proposal {
            height: 9,
            round: 0,
            block_data: vec![9],
            signature: Signature::zero(),
        };
        receiving_new_message(
            &node,
            Message::Proposal(ProposalMessage {
                proposal: proposal.clone(),
            }),
            pid,
        )
        .unwrap();
        assert_eq!(node.consensus.set_proposals(), vec![proposal]);
        assert!(node.consensus.queued_proposals().is_empty());
    }

    #[tokio::test]
    async fn test_proposal_outside_active_round_is_queued() {
        let node = setup().await;
        let pid = add_peer(&node, Services::NONE);
        node.consensus.set_height_round(9, 0);

        let proposal = Proposal {
            height: 12,
            round: 1,
            block_data: vec![12],
            signature: Signature::zero(),
        };
        receiving_new_message(
            &node,
            Message::Proposal(ProposalMessage {
                proposal: proposal.clone(),
            }),
            pid,
        )
        .unwrap();
        assert_eq!(node.consensus.queued_proposals(), vec![proposal]);
        assert!(node.consensus.set_proposals().is_empty());
    }

    #[tokio::test]
    async fn test_query_votes_served_when_available() {
        let mut node = setup().await;
        let pid = add_peer(&node, Services::NONE);

        let vote = Vote {
            height: 4,
            round: 2,
            voter: ValidatorKey::generate().address(),
            block_hash: Hash::from_bytes(b"voted block"),
            signature: Signature::zero(),
        };
        node.consensus.add_vote(vote.clone());

        receiving_new_message(
            &node,
            Message::QueryVotes(QueryVotesMessage { height: 4, round: 2 }),
            pid,
        )
        .unwrap();

        let (bundle, target) =
            should_publish_message_with_this_type(&mut node, MessageType::Vote).await;
        assert_eq!(target, Some(pid));
        let Message::Vote(reply) = bundle.message else {
            unreachable!()
        };
        assert_eq!(reply.vote, vote);
    }

    #[tokio::test]
    async fn test_vote_feeds_consensus() {
        let node = setup().await;
        let pid = add_peer(&node, Services::NONE);

        let vote = Vote {
            height: 3,
            round: 0,
            voter: ValidatorKey::generate().address(),
            block_hash: Hash::ZERO,
            signature: Signature::zero(),
        };
        receiving_new_message(&node, Message::Vote(VoteMessage { vote: vote.clone() }), pid)
            .unwrap();
        assert_eq!(node.consensus.received_votes(), vec![vote]);
    }

    #[tokio::test]
    async fn test_transactions_reach_the_pool() {
        let node = setup().await;
        let pid = add_peer(&node, Services::NONE);

        let (block, _) = generate_test_block(1);
        let transactions = block.transactions.clone();
        receiving_new_message(
            &node,
            Message::Transactions(TransactionsMessage {
                transactions: transactions.clone(),
            }),
            pid,
        )
        .unwrap();
        assert_eq!(node.state.pending_transactions(), transactions);
    }

    #[tokio::test]
    async fn test_empty_transactions_rejected() {
        let node = setup().await;
        let pid = add_peer(&node, Services::NONE);

        let err = receiving_new_message(
            &node,
            Message::Transactions(TransactionsMessage {
                transactions: vec![],
            }),
            pid,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::InvalidMessage(_)));
    }

    // ── Serving blocks ──

    fn fill_state(node: &TestNode, up_to: Height) {
        for height in 1..=up_to {
            let (block, certificate) = generate_test_block(height);
            node.state.append_block(height, &block, certificate);
        }
    }

    #[tokio::test]
    async fn test_blocks_request_served_in_range() {
        let mut node = setup().await;
        fill_state(&node, 13);
        let pid = add_peer(&node, Services::NONE);

        receiving_new_message(
            &node,
            Message::BlocksRequest(BlocksRequestMessage {
                session_id: 77,
                from: 1,
                count: 11,
            }),
            pid,
        )
        .unwrap();

        let (bundle, target) =
            should_publish_message_with_this_type(&mut node, MessageType::BlocksResponse).await;
        assert_eq!(target, Some(pid));
        let Message::BlocksResponse(resp) = bundle.message else {
            unreachable!()
        };
        assert_eq!(resp.code, ResponseCode::More);
        assert_eq!(resp.session_id, 77);
        assert_eq!(resp.from, 1);
        assert_eq!(resp.count(), 11);

        // The served blocks decode to what the store holds.
        let first = meridian_types::Block::from_bytes(&resp.blocks_data[0]).unwrap();
        assert!(first.basic_check().is_ok());

        // Range [1, 11] does not reach our tip (13): no Synced follow-up.
        should_not_publish_message_with_this_type(&mut node, MessageType::BlocksResponse).await;
    }

    #[tokio::test]
    async fn test_blocks_request_at_tip_finishes_synced() {
        let mut node = setup().await;
        fill_state(&node, 13);
        let pid = add_peer(&node, Services::NONE);

        receiving_new_message(
            &node,
            Message::BlocksRequest(BlocksRequestMessage {
                session_id: 5,
                from: 12,
                count: 11,
            }),
            pid,
        )
        .unwrap();

        let (bundle, _) =
            should_publish_message_with_this_type(&mut node, MessageType::BlocksResponse).await;
        let Message::BlocksResponse(resp) = bundle.message else {
            unreachable!()
        };
        assert_eq!(resp.code, ResponseCode::More);
        assert_eq!(resp.count(), 2); // clamped to the tip

        let (bundle, _) =
            should_publish_message_with_this_type(&mut node, MessageType::BlocksResponse).await;
        let Message::BlocksResponse(synced) = bundle.message else {
            unreachable!()
        };
        assert_eq!(synced.code, ResponseCode::Synced);
        assert_eq!(synced.last_certificate.as_ref().unwrap().height, 13);
    }

    #[tokio::test]
    async fn test_blocks_request_beyond_tip_rejected() {
        let mut node = setup().await;
        fill_state(&node, 13);
        let pid = add_peer(&node, Services::NONE);

        receiving_new_message(
            &node,
            Message::BlocksRequest(BlocksRequestMessage {
                session_id: 6,
                from: 100,
                count: 5,
            }),
            pid,
        )
        .unwrap();

        let (bundle, _) =
            should_publish_message_with_this_type(&mut node, MessageType::BlocksResponse).await;
        let Message::BlocksResponse(resp) = bundle.message else {
            unreachable!()
        };
        assert_eq!(resp.code, ResponseCode::Rejected);
        assert!(!resp.reason.is_empty());
    }

    #[tokio::test]
    async fn test_blocks_request_over_limit_rejected() {
        let mut node = setup().await;
        fill_state(&node, 13);
        let pid = add_peer(&node, Services::NONE);

        receiving_new_message(
            &node,
            Message::BlocksRequest(BlocksRequestMessage {
                session_id: 7,
                from: 1,
                count: 12, // block_per_message is 11
            }),
            pid,
        )
        .unwrap();

        let (bundle, _) =
            should_publish_message_with_this_type(&mut node, MessageType::BlocksResponse).await;
        let Message::BlocksResponse(resp) = bundle.message else {
            unreachable!()
        };
        assert_eq!(resp.code, ResponseCode::Rejected);
    }

    #[tokio::test]
    async fn test_blocks_request_rejected_without_network_service() {
        let config = SyncConfig {
            node_network: false,
            ..test_config()
        };
        let mut node = setup_with(config).await;
        fill_state(&node, 13);
        let pid = add_peer(&node, Services::NONE);

        receiving_new_message(
            &node,
            Message::BlocksRequest(BlocksRequestMessage {
                session_id: 8,
                from: 1,
                count: 5,
            }),
            pid,
        )
        .unwrap();

        let (bundle, _) =
            should_publish_message_with_this_type(&mut node, MessageType::BlocksResponse).await;
        let Message::BlocksResponse(resp) = bundle.message else {
            unreachable!()
        };
        assert_eq!(resp.code, ResponseCode::Rejected);
    }

    #[tokio::test]
    async fn test_prepare_blocks() {
        let node = setup().await;
        fill_state(&node, 13);

        // Beyond the tip.
        assert!(node.core().prepare_blocks(14, 1).is_none());

        // Clamped at the tip.
        let blocks = node.core().prepare_blocks(10, 10).unwrap();
        assert_eq!(blocks.len(), 4);

        // Fully in range.
        let blocks = node.core().prepare_blocks(1, 13).unwrap();
        assert_eq!(blocks.len(), 13);
    }

    // ── Commit pump ──

    #[tokio::test]
    async fn test_commit_pump_commits_in_order() {
        let node = setup().await;

        for height in 1..=3 {
            let (block, certificate) = generate_test_block(height);
            node.core().cache().add_block(height, Arc::new(block));
            node.core().cache().add_certificate(height, certificate);
        }

        node.core().try_commit_blocks().unwrap();

        assert_eq!(node.state.last_block_height(), 3);
        assert_eq!(node.state.committed_heights(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_commit_pump_stops_at_gap() {
        let node = setup().await;

        let (block, certificate) = generate_test_block(1);
        node.core().cache().add_block(1, Arc::new(block));
        node.core().cache().add_certificate(1, certificate);
        // Height 2 is missing; height 3 is cached.
        let (block, certificate) = generate_test_block(3);
        node.core().cache().add_block(3, Arc::new(block));
        node.core().cache().add_certificate(3, certificate);

        node.core().try_commit_blocks().unwrap();
        assert_eq!(node.state.last_block_height(), 1);
    }

    #[tokio::test]
    async fn test_commit_pump_resolves_stripped_keys() {
        let node = setup().await;

        let (mut block, certificate) = generate_test_block(1);
        let key = block.transactions[0].public_key.unwrap();
        let signer = block.transactions[0].signer;
        block.transactions[0].public_key = None;
        node.state.register_public_key(signer, key);

        node.core().cache().add_block(1, Arc::new(block));
        node.core().cache().add_certificate(1, certificate);

        node.core().try_commit_blocks().unwrap();
        assert_eq!(node.state.last_block_height(), 1);
    }

    #[tokio::test]
    async fn test_commit_pump_fails_on_unknown_key() {
        let node = setup().await;

        let (mut block, certificate) = generate_test_block(1);
        block.transactions[0].public_key = None; // no key registered

        node.core().cache().add_block(1, Arc::new(block));
        node.core().cache().add_certificate(1, certificate);

        let err = node.core().try_commit_blocks().unwrap_err();
        assert!(matches!(err, SyncError::UnknownPublicKey(_)));
        assert_eq!(node.state.last_block_height(), 0);
    }

    #[tokio::test]
    async fn test_commit_pump_rejects_bad_certificate() {
        let node = setup().await;

        let (block, mut certificate) = generate_test_block(1);
        certificate.committers.clear();

        node.core().cache().add_block(1, Arc::new(block));
        node.core().cache().add_certificate(1, certificate);

        let err = node.core().try_commit_blocks().unwrap_err();
        assert!(matches!(err, SyncError::InvalidCertificate(_)));
        assert_eq!(node.state.last_block_height(), 0);
    }

    #[tokio::test]
    async fn test_commit_moves_consensus_when_caught_up() {
        let node = setup().await;
        node.consensus.set_height_round(1, 0);

        let (block, certificate) = generate_test_block(1);
        node.core().cache().add_block(1, Arc::new(block));
        node.core().cache().add_certificate(1, certificate);

        let before = node.consensus.move_count();
        node.core().try_commit_blocks().unwrap();
        assert!(node.consensus.move_count() > before);
    }

    #[tokio::test]
    async fn test_blocks_response_commits_downloaded_blocks() {
        let node = setup().await;
        let pid = add_peer(&node, Services::NETWORK);
        let session = node.sync.peer_set().open_session(pid);

        let mut blocks_data = Vec::new();
        let mut last_certificate = None;
        for height in 1..=3 {
            let (block, certificate) = generate_test_block(height);
            blocks_data.push(block.to_bytes());
            last_certificate = Some(certificate);
        }

        receiving_new_message(
            &node,
            Message::BlocksResponse(BlocksResponseMessage {
                code: ResponseCode::Synced,
                reason: String::new(),
                session_id: session.session_id(),
                from: 1,
                blocks_data,
                last_certificate,
            }),
            pid,
        )
        .unwrap();

        // Blocks 1 and 2 commit via embedded prev-certificates, 3 via the
        // final certificate; the session closes on Synced.
        assert_eq!(node.state.last_block_height(), 3);
        assert!(!node.sync.peer_set().has_open_session(pid));
    }

    #[tokio::test]
    async fn test_blocks_response_for_closed_session_fails() {
        let node = setup().await;
        let pid = add_peer(&node, Services::NETWORK);
        let session = node.sync.peer_set().open_session(pid);
        node.sync.peer_set().close_session(session.session_id());

        let err = receiving_new_message(
            &node,
            Message::BlocksResponse(BlocksResponseMessage {
                code: ResponseCode::More,
                reason: String::new(),
                session_id: session.session_id(),
                from: 1,
                blocks_data: vec![],
                last_certificate: None,
            }),
            pid,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::SessionExpired(_)));
        assert_eq!(node.state.last_block_height(), 0);
    }

    #[tokio::test]
    async fn test_blocks_response_with_garbage_block_fails() {
        let node = setup().await;
        let pid = add_peer(&node, Services::NETWORK);
        let session = node.sync.peer_set().open_session(pid);

        let err = receiving_new_message(
            &node,
            Message::BlocksResponse(BlocksResponseMessage {
                code: ResponseCode::More,
                reason: String::new(),
                session_id: session.session_id(),
                from: 1,
                blocks_data: vec![b"not a block".to_vec()],
                last_certificate: None,
            }),
            pid,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::InvalidMessage(_)));
    }

    // ── Firewall integration ──

    #[tokio::test]
    async fn test_gossip_event_dispatches_through_firewall() {
        let node = setup().await;
        let pid = add_peer(&node, Services::NONE);

        let vote = Vote {
            height: 2,
            round: 0,
            voter: ValidatorKey::generate().address(),
            block_hash: Hash::ZERO,
            signature: Signature::zero(),
        };
        let mut bundle = Bundle::new(pid, Message::Vote(VoteMessage { vote: vote.clone() }));
        bundle.flags.set(BundleFlags::CARRIER_LIBP2P);
        bundle.flags.set(BundleFlags::NETWORK_TESTNET);

        node.network_tx
            .send(NetworkEvent::Gossip {
                data: bundle.encode(),
                source: pid,
                from: pid,
            })
            .await
            .unwrap();

        // Wait for the loop to process the event.
        tokio::time::timeout(Duration::from_secs(3), async {
            while node.consensus.received_votes().is_empty() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("vote never dispatched");
        assert_eq!(node.consensus.received_votes(), vec![vote]);
    }

    #[tokio::test]
    async fn test_network_mismatch_is_never_dispatched() {
        let node = setup().await;
        let pid = add_peer(&node, Services::NONE);

        let vote = Vote {
            height: 2,
            round: 0,
            voter: ValidatorKey::generate().address(),
            block_hash: Hash::ZERO,
            signature: Signature::zero(),
        };
        let mut bundle = Bundle::new(pid, Message::Vote(VoteMessage { vote }));
        bundle.flags.set(BundleFlags::CARRIER_LIBP2P);
        bundle.flags.set(BundleFlags::NETWORK_MAINNET); // we are testnet

        node.network_tx
            .send(NetworkEvent::Gossip {
                data: bundle.encode(),
                source: pid,
                from: pid,
            })
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(3), async {
            while node.sync.peer_set().get_peer(pid).unwrap().invalid_bundles == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("mismatched bundle never counted");
        assert!(node.consensus.received_votes().is_empty());
    }

    #[tokio::test]
    async fn test_stream_event_is_answered() {
        let mut node = setup().await;
        let pid = PeerId::random();
        let keys = vec![ValidatorKey::generate()];

        let mut bundle = Bundle::new(pid, Message::Hello(signed_hello(&node, pid, &keys)));
        bundle.flags.set(BundleFlags::CARRIER_LIBP2P);
        bundle.flags.set(BundleFlags::NETWORK_TESTNET);
        let reader: StreamReader = Box::new(std::io::Cursor::new(bundle.encode()));

        node.network_tx
            .send(NetworkEvent::Stream {
                source: pid,
                reader,
            })
            .await
            .unwrap();

        let (_, target) =
            should_publish_message_with_this_type(&mut node, MessageType::HelloAck).await;
        assert_eq!(target, Some(pid));
    }

    // ── Broadcast loop ──

    #[tokio::test]
    async fn test_broadcast_loop_frames_and_publishes() {
        let mut node = setup().await;

        let vote = Vote {
            height: 7,
            round: 1,
            voter: ValidatorKey::generate().address(),
            block_hash: Hash::ZERO,
            signature: Signature::zero(),
        };
        node.broadcast_tx
            .send(Message::Vote(VoteMessage { vote }))
            .await
            .unwrap();

        let (bundle, target) =
            should_publish_message_with_this_type(&mut node, MessageType::Vote).await;
        assert_eq!(target, None);
        assert!(bundle.flags.contains(BundleFlags::BROADCASTED));
    }

    #[tokio::test]
    async fn test_broadcast_topic_routing() {
        let mut node = setup().await;

        let (block, certificate) = generate_test_block(4);
        node.broadcast_tx
            .send(Message::BlockAnnounce(BlockAnnounceMessage {
                height: 4,
                block,
                certificate,
            }))
            .await
            .unwrap();

        let published = tokio::time::timeout(Duration::from_secs(3), node.publish_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(published.topic, Some(TopicId::General));

        node.broadcast_tx
            .send(Message::Vote(VoteMessage {
                vote: Vote {
                    height: 1,
                    round: 0,
                    voter: ValidatorKey::generate().address(),
                    block_hash: Hash::ZERO,
                    signature: Signature::zero(),
                },
            }))
            .await
            .unwrap();

        let published = tokio::time::timeout(Duration::from_secs(3), node.publish_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(published.topic, Some(TopicId::Consensus));
    }

    // ── Housekeeping ──

    #[tokio::test]
    async fn test_expired_sessions_are_swept_by_housekeeping() {
        let config = SyncConfig {
            session_timeout: Duration::from_millis(100),
            ..test_config()
        };
        let node = setup_with(config).await;
        // A synced node opens no new sessions, so the swept one stays closed.
        node.state.set_last_block_time(unix_now());
        let pid = add_peer(&node, Services::NETWORK);
        node.sync.peer_set().open_session(pid);

        tokio::time::timeout(Duration::from_secs(3), async {
            while node.sync.peer_set().has_open_session(pid) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("session never swept");
    }

    // ── Accounting ──

    #[tokio::test]
    async fn test_network_info_tracks_bytes() {
        let mut node = setup().await;
        let pid = PeerId::random();

        node.network_tx
            .send(NetworkEvent::Connect {
                peer: pid,
                remote_address: "address_1".into(),
                support_stream: true,
            })
            .await
            .unwrap();
        should_publish_message_with_this_type(&mut node, MessageType::Hello).await;

        let info = node.sync.peer_set().network_info();
        assert!(info.total_sent_bytes[&MessageType::Hello] > 0);
        let peer = info.peers.iter().find(|p| p.peer_id == pid).unwrap();
        assert!(peer.sent_bytes[&MessageType::Hello] > 0);
        assert!(peer.last_sent.is_some());
    }
}
