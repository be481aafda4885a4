//! Per-type message payloads.
//!
//! Each payload is a plain `BasicSbor` struct; the bundle codec frames it
//! with the initiator, flags, and type tag.

use meridian_types::{
    aggregate_signatures, verify_aggregate, Block, Certificate, Hash, Height, PeerId, Proposal,
    PublicKey, Services, Signature, Transaction, ValidatorKey, Vote,
};
use sbor::prelude::*;

use crate::ResponseCode;

/// Domain tag for the hello signing message.
const DOMAIN_HELLO: &[u8] = b"MERIDIAN_HELLO_V1";

/// Handshake greeting: identity, chain tip, and services, signed by the
/// node's validator keys.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct HelloMessage {
    /// The sender's peer id.
    pub peer_id: PeerId,

    /// The sender's software agent string.
    pub agent: String,

    /// Display name chosen by the operator.
    pub moniker: String,

    /// The sender's committed tip height.
    pub height: Height,

    /// Hash of the sender's tip block.
    pub block_hash: Hash,

    /// Hash of the sender's genesis document.
    pub genesis_hash: Hash,

    /// Services the sender advertises.
    pub services: Services,

    /// Public keys of the sender's validators.
    pub public_keys: Vec<PublicKey>,

    /// Aggregate signature of all declared keys over [`Self::signing_message`].
    pub signature: Option<Signature>,
}

impl HelloMessage {
    /// Create an unsigned hello.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        peer_id: PeerId,
        agent: String,
        moniker: String,
        height: Height,
        block_hash: Hash,
        genesis_hash: Hash,
        services: Services,
    ) -> Self {
        Self {
            peer_id,
            agent,
            moniker,
            height,
            block_hash,
            genesis_hash,
            services,
            public_keys: Vec::new(),
            signature: None,
        }
    }

    /// The canonical bytes the validator keys sign.
    ///
    /// Covers the fields a malicious relay must not be able to alter:
    /// identity, tip, genesis, and services.
    pub fn signing_message(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(128);
        msg.extend_from_slice(DOMAIN_HELLO);
        msg.extend_from_slice(self.peer_id.as_bytes());
        msg.extend_from_slice(&self.height.to_le_bytes());
        msg.extend_from_slice(self.block_hash.as_bytes());
        msg.extend_from_slice(self.genesis_hash.as_bytes());
        msg.extend_from_slice(&self.services.bits().to_le_bytes());
        msg
    }

    /// Sign with all of the node's validator keys, declaring their public
    /// keys and attaching the aggregate signature.
    pub fn sign(&mut self, keys: &[ValidatorKey]) {
        self.public_keys = keys.iter().map(|k| k.public_key()).collect();
        let message = self.signing_message();
        let signatures: Vec<Signature> = keys.iter().map(|k| k.sign(&message)).collect();
        self.signature = aggregate_signatures(&signatures);
    }

    /// Verify the aggregate signature against the declared public keys.
    pub fn verify_signature(&self) -> bool {
        match &self.signature {
            Some(signature) => {
                !self.public_keys.is_empty()
                    && verify_aggregate(&self.signing_message(), signature, &self.public_keys)
            }
            None => false,
        }
    }
}

/// Handshake acknowledgment, completing the hello exchange.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct HelloAckMessage {
    /// The responder's committed tip height.
    pub height: Height,
}

/// Gossip of mempool entries.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct TransactionsMessage {
    /// The gossiped transactions.
    pub transactions: Vec<Transaction>,
}

/// Ask a peer for the consensus proposal at a height and round.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct QueryProposalMessage {
    pub height: Height,
    pub round: i16,
}

/// Push a consensus proposal.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct ProposalMessage {
    pub proposal: Proposal,
}

/// Ask a peer for its consensus votes at a height and round.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct QueryVotesMessage {
    pub height: Height,
    pub round: i16,
}

/// Push a consensus vote.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct VoteMessage {
    pub vote: Vote,
}

/// Advertise a freshly committed tip.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct BlockAnnounceMessage {
    /// Height of the announced block.
    pub height: Height,

    /// The announced block.
    pub block: Block,

    /// The certificate that committed it.
    pub certificate: Certificate,
}

/// Session-bound request for a contiguous range of blocks.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct BlocksRequestMessage {
    /// The requester's session id.
    pub session_id: u32,

    /// First height requested.
    pub from: Height,

    /// Number of blocks requested.
    pub count: u32,
}

impl BlocksRequestMessage {
    /// Last height covered by this request.
    pub fn to(&self) -> Height {
        self.from.saturating_add(self.count.saturating_sub(1))
    }
}

/// One chunk of a block-download reply.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct BlocksResponseMessage {
    /// Outcome of the request this chunk belongs to.
    pub code: ResponseCode,

    /// Human-readable reason, set when the request is rejected.
    pub reason: String,

    /// The requester's session id, echoed back.
    pub session_id: u32,

    /// Height of the first block in `blocks_data`.
    pub from: Height,

    /// Raw encodings of consecutive blocks starting at `from`.
    pub blocks_data: Vec<Vec<u8>>,

    /// Certificate of the last block, sent with the final chunk so the
    /// requester can commit up to it.
    pub last_certificate: Option<Certificate>,
}

impl BlocksResponseMessage {
    /// Number of blocks in this chunk.
    pub fn count(&self) -> u32 {
        self.blocks_data.len() as u32
    }

    /// Height of the last block in this chunk.
    pub fn to(&self) -> Height {
        if self.blocks_data.is_empty() {
            self.from
        } else {
            self.from.saturating_add(self.count() - 1)
        }
    }

    /// Whether the responder refused the request.
    pub fn is_request_rejected(&self) -> bool {
        self.code == ResponseCode::Rejected
    }
}
