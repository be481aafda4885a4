//! Network trait for the peer-to-peer transport.
//!
//! Defines the interface the synchronizer consumes. A production backend
//! wraps a gossip/streaming substrate; tests use the in-memory
//! [`MemoryNetwork`](crate::memory::MemoryNetwork).
//!
//! Sends are synchronous hand-offs: implementations queue or dispatch
//! internally and own per-message timeouts. Incoming traffic is delivered
//! out-of-band on an event channel the host wires up at construction.

use meridian_types::PeerId;
use tokio::io::AsyncRead;

/// Error returned when a transport operation fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// The message could not be handed to the transport.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A topic operation was attempted before joining the topic.
    #[error("topic not joined: {0:?}")]
    NotJoined(TopicId),

    /// The transport has shut down.
    #[error("network closed")]
    Closed,
}

/// Pub-sub topics the node participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicId {
    /// General traffic: handshakes, transactions, block announcements.
    General,
    /// Consensus traffic: proposals and votes.
    Consensus,
}

/// A readable inbound stream, closed by dropping.
pub type StreamReader = Box<dyn AsyncRead + Send + Unpin>;

/// An event produced by the transport.
pub enum NetworkEvent {
    /// A message received over gossip.
    Gossip {
        /// Raw bundle bytes.
        data: Vec<u8>,
        /// The peer that originated the bundle.
        source: PeerId,
        /// The peer that relayed it to us.
        from: PeerId,
    },

    /// A direct stream opened by a peer. The receiver must consume and drop
    /// the reader on all exit paths.
    Stream {
        /// The peer that opened the stream.
        source: PeerId,
        /// The stream contents.
        reader: StreamReader,
    },

    /// A peer connected.
    Connect {
        /// The connecting peer.
        peer: PeerId,
        /// Observed remote address.
        remote_address: String,
        /// Whether the peer supports direct streams.
        support_stream: bool,
    },

    /// A peer disconnected.
    Disconnect {
        /// The departing peer.
        peer: PeerId,
    },
}

impl std::fmt::Debug for NetworkEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkEvent::Gossip { data, source, from } => f
                .debug_struct("Gossip")
                .field("len", &data.len())
                .field("source", source)
                .field("from", from)
                .finish(),
            NetworkEvent::Stream { source, .. } => {
                f.debug_struct("Stream").field("source", source).finish()
            }
            NetworkEvent::Connect {
                peer,
                remote_address,
                support_stream,
            } => f
                .debug_struct("Connect")
                .field("peer", peer)
                .field("remote_address", remote_address)
                .field("support_stream", support_stream)
                .finish(),
            NetworkEvent::Disconnect { peer } => {
                f.debug_struct("Disconnect").field("peer", peer).finish()
            }
        }
    }
}

/// Network interface for sending framed bundles and managing connections.
///
/// Object-safe so hosts can hand the synchronizer an `Arc<dyn Network>`.
pub trait Network: Send + Sync {
    /// Send raw bundle bytes to a specific peer.
    fn send_to(&self, data: Vec<u8>, to: PeerId) -> Result<(), NetworkError>;

    /// Broadcast raw bundle bytes on a topic.
    fn broadcast(&self, data: Vec<u8>, topic: TopicId) -> Result<(), NetworkError>;

    /// Close the connection to a peer.
    fn close_connection(&self, peer: PeerId);

    /// Subscribe to the general topic.
    fn join_general_topic(&self) -> Result<(), NetworkError>;

    /// Subscribe to the consensus topic.
    fn join_consensus_topic(&self) -> Result<(), NetworkError>;

    /// The local node's peer id.
    fn self_id(&self) -> PeerId;
}
