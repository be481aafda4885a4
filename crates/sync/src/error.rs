//! Synchronizer error types.

use meridian_messages::BundleError;
use meridian_network::NetworkError;
use meridian_types::{Address, BlockError, CertificateError, PeerId};

/// Errors produced by the synchronizer.
///
/// Handler-level errors are logged and counted against the initiating peer,
/// never propagated out of the event loop. The only fatal variant is
/// [`SyncError::Config`], raised at construction time.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Malformed or unexpected message content.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A block failed its structural checks.
    #[error(transparent)]
    InvalidBlock(#[from] BlockError),

    /// A certificate failed its structural checks.
    #[error(transparent)]
    InvalidCertificate(#[from] CertificateError),

    /// The hello signature did not verify against the declared keys.
    #[error("invalid hello signature")]
    InvalidSignature,

    /// The peer's genesis hash differs from ours.
    #[error("peer is on a different chain (genesis {0})")]
    InvalidGenesisHash(meridian_types::Hash),

    /// The bundle's network flag does not match our chain.
    #[error("bundle network tag does not match our chain")]
    NetworkMismatch,

    /// The initiating peer is banned.
    #[error("peer {0} is banned")]
    PeerBanned(PeerId),

    /// A session was closed or expired before its response arrived.
    #[error("session {0} is not open")]
    SessionExpired(u32),

    /// The transport refused an outbound message.
    #[error(transparent)]
    Transport(#[from] NetworkError),

    /// The bundle failed to decode.
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// The state collaborator rejected an operation.
    #[error("state error: {0}")]
    State(String),

    /// No public key known for a transaction signer.
    #[error("unknown public key for address {0}")]
    UnknownPublicKey(Address),

    /// Invalid configuration (fatal, construction time only).
    #[error("invalid configuration: {0}")]
    Config(String),
}
