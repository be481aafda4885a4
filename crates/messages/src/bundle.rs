//! Bundle framing: the unit that travels on the wire.
//!
//! # Wire format
//!
//! ```text
//! [initiator: 32B][flags: u32 LE][message_type: u16 LE][payload_len: u32 LE][SBOR payload]
//! ```
//!
//! The header is framed by hand so the flag word can be inspected (and the
//! bundle rejected) without decoding the payload. Payloads are SBOR.

use crate::{
    BlockAnnounceMessage, BlocksRequestMessage, BlocksResponseMessage, HelloAckMessage,
    HelloMessage, Message, MessageType, ProposalMessage, QueryProposalMessage, QueryVotesMessage,
    TransactionsMessage, VoteMessage,
};
use meridian_types::PeerId;
use std::fmt;

/// Size of the fixed bundle header.
const HEADER_SIZE: usize = PeerId::BYTES + 4 + 2 + 4;

/// Maximum accepted payload size.
const MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024; // 10 MB

/// Flag word carried in every bundle header.
///
/// Bits are grouped: carrier, network tag, and mode. Exactly one network bit
/// is set on mainnet/testnet bundles; localnet bundles carry none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BundleFlags(u32);

impl BundleFlags {
    /// Bundle travels over the libp2p carrier.
    pub const CARRIER_LIBP2P: Self = Self(1 << 0);

    /// Bundle belongs to the main network.
    pub const NETWORK_MAINNET: Self = Self(1 << 1);

    /// Bundle belongs to the test network.
    pub const NETWORK_TESTNET: Self = Self(1 << 2);

    /// Bundle was broadcast rather than sent point-to-point.
    pub const BROADCASTED: Self = Self(1 << 3);

    /// Bundle is part of the hello handshake.
    pub const HANDSHAKING: Self = Self(1 << 4);

    /// No flags set.
    pub fn empty() -> Self {
        Self(0)
    }

    /// Construct from a raw flag word. Unknown bits are preserved.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw flag word.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Whether all bits of `flag` are set.
    pub fn contains(&self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Set all bits of `flag`.
    pub fn set(&mut self, flag: Self) {
        self.0 |= flag.0;
    }

    /// Builder-style [`Self::set`].
    pub fn with(mut self, flag: Self) -> Self {
        self.set(flag);
        self
    }
}

/// One framed unit on the wire: initiator, flags, and a typed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    /// The peer that created this bundle (not necessarily the relay it
    /// arrived from).
    pub initiator: PeerId,

    /// Flag word; see [`BundleFlags`].
    pub flags: BundleFlags,

    /// The carried message.
    pub message: Message,
}

impl Bundle {
    /// Create a bundle with no flags set.
    pub fn new(initiator: PeerId, message: Message) -> Self {
        Self {
            initiator,
            flags: BundleFlags::empty(),
            message,
        }
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let payload = encode_payload(&self.message);
        let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
        out.extend_from_slice(self.initiator.as_bytes());
        out.extend_from_slice(&self.flags.bits().to_le_bytes());
        out.extend_from_slice(&(self.message.message_type() as u16).to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&payload);
        out
    }

    /// Decode from wire bytes.
    ///
    /// Rejects unknown message types, truncated input, oversize payloads,
    /// and trailing bytes.
    pub fn decode(data: &[u8]) -> Result<Self, BundleError> {
        if data.len() < HEADER_SIZE {
            return Err(BundleError::TooShort(data.len()));
        }

        let mut initiator = [0u8; PeerId::BYTES];
        initiator.copy_from_slice(&data[..PeerId::BYTES]);
        let mut offset = PeerId::BYTES;

        let flags = u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap());
        offset += 4;
        let raw_type = u16::from_le_bytes(data[offset..offset + 2].try_into().unwrap());
        offset += 2;
        let payload_len =
            u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap()) as usize;
        offset += 4;

        let message_type =
            MessageType::from_wire(raw_type).ok_or(BundleError::UnknownMessageType(raw_type))?;

        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(BundleError::PayloadTooLarge(payload_len));
        }
        if data.len() - offset != payload_len {
            return Err(BundleError::LengthMismatch {
                declared: payload_len,
                actual: data.len() - offset,
            });
        }

        let message = decode_payload(message_type, &data[offset..])?;

        Ok(Self {
            initiator: PeerId::from_bytes(initiator),
            flags: BundleFlags::from_bits(flags),
            message,
        })
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{⚑ {:#x} {}}}", self.flags.bits(), self.message)
    }
}

fn encode_payload(message: &Message) -> Vec<u8> {
    let encoded = match message {
        Message::Hello(m) => sbor::basic_encode(m),
        Message::HelloAck(m) => sbor::basic_encode(m),
        Message::Transactions(m) => sbor::basic_encode(m),
        Message::QueryProposal(m) => sbor::basic_encode(m),
        Message::Proposal(m) => sbor::basic_encode(m),
        Message::QueryVotes(m) => sbor::basic_encode(m),
        Message::Vote(m) => sbor::basic_encode(m),
        Message::BlockAnnounce(m) => sbor::basic_encode(m),
        Message::BlocksRequest(m) => sbor::basic_encode(m),
        Message::BlocksResponse(m) => sbor::basic_encode(m),
    };
    encoded.expect("message serialization should never fail")
}

fn decode_payload(message_type: MessageType, payload: &[u8]) -> Result<Message, BundleError> {
    let message = match message_type {
        MessageType::Hello => Message::Hello(decode::<HelloMessage>(payload)?),
        MessageType::HelloAck => Message::HelloAck(decode::<HelloAckMessage>(payload)?),
        MessageType::Transactions => {
            Message::Transactions(decode::<TransactionsMessage>(payload)?)
        }
        MessageType::QueryProposal => {
            Message::QueryProposal(decode::<QueryProposalMessage>(payload)?)
        }
        MessageType::Proposal => Message::Proposal(decode::<ProposalMessage>(payload)?),
        MessageType::QueryVotes => Message::QueryVotes(decode::<QueryVotesMessage>(payload)?),
        MessageType::Vote => Message::Vote(decode::<VoteMessage>(payload)?),
        MessageType::BlockAnnounce => {
            Message::BlockAnnounce(decode::<BlockAnnounceMessage>(payload)?)
        }
        MessageType::BlocksRequest => {
            Message::BlocksRequest(decode::<BlocksRequestMessage>(payload)?)
        }
        MessageType::BlocksResponse => {
            Message::BlocksResponse(decode::<BlocksResponseMessage>(payload)?)
        }
    };
    Ok(message)
}

fn decode<T: sbor::prelude::BasicDecode>(payload: &[u8]) -> Result<T, BundleError> {
    sbor::basic_decode(payload).map_err(|e| BundleError::Payload(format!("{e:?}")))
}

/// Errors from bundle encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BundleError {
    /// Input shorter than the fixed header.
    #[error("bundle too short: {0} bytes")]
    TooShort(usize),

    /// The type tag is not a recognized message type.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u16),

    /// Declared payload size exceeds the accepted maximum.
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// Declared payload size disagrees with the actual remainder.
    #[error("payload length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// The payload failed to decode.
    #[error("payload decode failed: {0}")]
    Payload(String),
}
