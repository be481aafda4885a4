//! In-memory [`Network`] implementation for component tests.
//!
//! Everything published is pushed onto an unbounded channel the test holds
//! the other end of, so tests can await "a bundle of type X was sent" with a
//! timeout. Send failures can be injected to exercise error paths, and
//! closed connections are recorded for assertions.

use crate::{Network, NetworkError, TopicId};
use meridian_types::PeerId;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// One published payload: the raw bytes plus the unicast target, if any.
#[derive(Debug, Clone)]
pub struct PublishedData {
    /// Raw bundle bytes as handed to the transport.
    pub data: Vec<u8>,

    /// `Some` for unicast sends, `None` for broadcasts.
    pub target: Option<PeerId>,

    /// The broadcast topic, for broadcast sends.
    pub topic: Option<TopicId>,
}

/// In-memory transport that records instead of sending.
pub struct MemoryNetwork {
    self_id: PeerId,
    publish_tx: mpsc::UnboundedSender<PublishedData>,
    send_error: Mutex<Option<NetworkError>>,
    closed_connections: Mutex<Vec<PeerId>>,
    joined_general: Mutex<bool>,
    joined_consensus: Mutex<bool>,
}

impl MemoryNetwork {
    /// Create a memory network and the receiver for its published data.
    pub fn new(self_id: PeerId) -> (Self, mpsc::UnboundedReceiver<PublishedData>) {
        let (publish_tx, publish_rx) = mpsc::unbounded_channel();
        let network = Self {
            self_id,
            publish_tx,
            send_error: Mutex::new(None),
            closed_connections: Mutex::new(Vec::new()),
            joined_general: Mutex::new(false),
            joined_consensus: Mutex::new(false),
        };
        (network, publish_rx)
    }

    /// Make every subsequent send/broadcast fail with the given error.
    pub fn inject_send_error(&self, error: NetworkError) {
        *self.send_error.lock() = Some(error);
    }

    /// Clear an injected send error.
    pub fn clear_send_error(&self) {
        *self.send_error.lock() = None;
    }

    /// Peers whose connections were closed, in order.
    pub fn closed_connections(&self) -> Vec<PeerId> {
        self.closed_connections.lock().clone()
    }

    /// Whether the general topic has been joined.
    pub fn joined_general(&self) -> bool {
        *self.joined_general.lock()
    }

    /// Whether the consensus topic has been joined.
    pub fn joined_consensus(&self) -> bool {
        *self.joined_consensus.lock()
    }
}

impl Network for MemoryNetwork {
    fn send_to(&self, data: Vec<u8>, to: PeerId) -> Result<(), NetworkError> {
        if let Some(err) = self.send_error.lock().clone() {
            return Err(err);
        }
        self.publish_tx
            .send(PublishedData {
                data,
                target: Some(to),
                topic: None,
            })
            .map_err(|_| NetworkError::Closed)
    }

    fn broadcast(&self, data: Vec<u8>, topic: TopicId) -> Result<(), NetworkError> {
        if let Some(err) = self.send_error.lock().clone() {
            return Err(err);
        }
        self.publish_tx
            .send(PublishedData {
                data,
                target: None,
                topic: Some(topic),
            })
            .map_err(|_| NetworkError::Closed)
    }

    fn close_connection(&self, peer: PeerId) {
        self.closed_connections.lock().push(peer);
    }

    fn join_general_topic(&self) -> Result<(), NetworkError> {
        *self.joined_general.lock() = true;
        Ok(())
    }

    fn join_consensus_topic(&self) -> Result<(), NetworkError> {
        *self.joined_consensus.lock() = true;
        Ok(())
    }

    fn self_id(&self) -> PeerId {
        self.self_id
    }
}
